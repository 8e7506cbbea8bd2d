use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::{EventPublish, EventQuery};
use crate::event::{Event, EventDraft, Filter};

#[derive(Debug)]
pub struct MemoryRelay {
    author: String,
    events: RwLock<Vec<Event>>,
}

impl MemoryRelay {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            events: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Stores an already stamped record, replacing any record at the same coordinate.
    pub async fn insert(&self, event: Event) {
        let mut events = self.events.write().await;
        events.retain(|existing| !super::same_coordinate(existing, &event));
        events.push(event);
    }
}

#[async_trait]
impl EventPublish for MemoryRelay {
    async fn publish(&self, draft: EventDraft) -> anyhow::Result<Event> {
        let event = super::stamp(&self.author, Utc::now().timestamp(), draft);
        self.insert(event.clone()).await;
        tracing::debug!(id = %event.id, d = ?event.identifier(), "memory relay stored event");
        Ok(event)
    }
}

#[async_trait]
impl EventQuery for MemoryRelay {
    async fn query(
        &self,
        filters: &[Filter],
        cancel: CancellationToken,
    ) -> anyhow::Result<Vec<Event>> {
        if cancel.is_cancelled() {
            anyhow::bail!("query cancelled");
        }
        let events = self.events.read().await;
        Ok(super::select(events.iter(), filters))
    }
}
