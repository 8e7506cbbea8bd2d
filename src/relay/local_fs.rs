use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest as _, Sha256};
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::client::{EventPublish, EventQuery};
use crate::event::{Event, EventDraft, Filter};

/// Relay store kept as one JSON file per addressable coordinate.
#[derive(Debug, Clone)]
pub struct LocalFsRelay {
    base_dir: PathBuf,
    author: Option<String>,
}

impl LocalFsRelay {
    /// Opens a read-only view of the store at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            author: None,
        }
    }

    /// Records published through this relay are attributed to `author`.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    fn events_dir(&self) -> PathBuf {
        self.base_dir.join("events")
    }

    fn event_path(&self, event: &Event) -> PathBuf {
        let digest = Sha256::digest(event.identifier().unwrap_or_default().as_bytes());
        self.events_dir().join(format!(
            "{}-{}-{}.json",
            event.kind,
            event.pubkey,
            hex::encode(digest)
        ))
    }

    async fn load_all(&self, cancel: &CancellationToken) -> anyhow::Result<Vec<Event>> {
        let dir = self.events_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read events dir: {}", dir.display()));
            }
        };

        let mut events = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("list events dir: {}", dir.display()))?
        {
            if cancel.is_cancelled() {
                anyhow::bail!("query cancelled");
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_event(&path).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), ?err, "skipping unreadable event");
                }
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl EventPublish for LocalFsRelay {
    async fn publish(&self, draft: EventDraft) -> anyhow::Result<Event> {
        let author = self
            .author
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("relay store has no author configured"))?;
        let event = super::stamp(author, Utc::now().timestamp(), draft);
        let dir = self.events_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create events dir: {}", dir.display()))?;
        let path = self.event_path(&event);
        store_event(&path, &event)
            .await
            .with_context(|| format!("store event {}", event.id))?;
        tracing::debug!(id = %event.id, path = %path.display(), "stored event");
        Ok(event)
    }
}

#[async_trait]
impl EventQuery for LocalFsRelay {
    async fn query(
        &self,
        filters: &[Filter],
        cancel: CancellationToken,
    ) -> anyhow::Result<Vec<Event>> {
        let events = self.load_all(&cancel).await?;
        Ok(super::select(events.iter(), filters))
    }
}

/// A file that vanished between listing and reading (an overwrite in flight) reads as `None`.
async fn read_event(path: &Path) -> anyhow::Result<Option<Event>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).context("read event file"),
    };
    let event = serde_json::from_slice::<Event>(&bytes).context("parse event json")?;
    Ok(Some(event))
}

/// Replaces the record at `path` in one rename so readers never see a partial file.
async fn store_event(path: &Path, event: &Event) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(event).context("serialize event")?;
    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("replace {}", path.display()));
    }
    Ok(())
}
