use std::sync::Mutex;

use async_trait::async_trait;
use nostrbook::client::{EventPublish, EventQuery};
use nostrbook::event::{Event, EventDraft, Filter};
use nostrbook::relay::MemoryRelay;
use tokio_util::sync::CancellationToken;

pub const AUTHOR: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

/// Memory relay that rejects chosen publish attempts and records every draft it sees.
pub struct ScriptedRelay {
    inner: MemoryRelay,
    fail_on: Mutex<Vec<usize>>,
    attempts: Mutex<Vec<EventDraft>>,
}

#[allow(dead_code)]
impl ScriptedRelay {
    pub fn new() -> Self {
        Self {
            inner: MemoryRelay::new(AUTHOR),
            fail_on: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Rejects the `n`th publish attempt (1-based).
    pub fn fail_attempt(self, n: usize) -> Self {
        self.fail_on.lock().unwrap().push(n);
        self
    }

    pub fn clear_failures(&self) {
        self.fail_on.lock().unwrap().clear();
    }

    pub fn attempts(&self) -> Vec<EventDraft> {
        self.attempts.lock().unwrap().clone()
    }

    pub async fn stored(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl EventPublish for ScriptedRelay {
    async fn publish(&self, draft: EventDraft) -> anyhow::Result<Event> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(draft.clone());
            attempts.len()
        };
        if self.fail_on.lock().unwrap().contains(&attempt) {
            anyhow::bail!("relay rejected attempt {attempt}");
        }
        self.inner.publish(draft).await
    }
}

#[async_trait]
impl EventQuery for ScriptedRelay {
    async fn query(
        &self,
        filters: &[Filter],
        cancel: CancellationToken,
    ) -> anyhow::Result<Vec<Event>> {
        self.inner.query(filters, cancel).await
    }
}
