//! Publishing a book: every chapter as its own addressable record, then the manifest.
//!
//! Chapters go out one at a time in ordinal order. If chapter `n` fails, chapters
//! `1..n` are already live and nothing after `n` was attempted; those chapters are not
//! retracted. All keys are derived from the title and ordinals, so re-running the same
//! publish overwrites the same records instead of duplicating them.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::address::{BookAddress, MAX_TLV_VALUE_LEN};
use crate::cli::PublishArgs;
use crate::client::EventPublish;
use crate::config::Config;
use crate::event::{
    Event, EventDraft, KIND_LONG_FORM, TAG_BOOK, TAG_CHAPTER, TAG_IDENTIFIER, TAG_IMAGE,
    TAG_PUBLISHED_AT, TAG_SUMMARY, TAG_TITLE, TAG_TOPIC, tag,
};
use crate::ident::{derive_book_identifier, derive_chapter_identifier};
use crate::manifest::{ManifestDocument, PublishedChapterRef};
use crate::relay::LocalFsRelay;
use crate::scan::{self, ChapterRecord};

/// Everything the author supplies for one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub identifier: String,
    pub summary: String,
    pub content: String,
    pub image: Option<String>,
    pub topics: Vec<String>,
}

impl BookDraft {
    /// Builds a draft from Markdown alone, taking title and summary from its `# ` heading
    /// and deriving the identifier from the title.
    #[must_use]
    pub fn from_markdown(content: impl Into<String>) -> Self {
        let content = content.into();
        let header = scan::extract_header(&content);
        Self {
            identifier: derive_book_identifier(&header.title),
            title: header.title,
            summary: header.summary,
            content,
            image: None,
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub identifier: String,
    pub chapters: Vec<PublishedChapterRef>,
    pub manifest: Event,
    /// `naddr` of the manifest record.
    pub address: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("identifier is required")]
    MissingIdentifier,
    #[error("content is required")]
    MissingContent,
    #[error("no chapters found; start each chapter with a `## ` heading")]
    NoChapters,
    #[error("chapter key {identifier:?} is {len} bytes; addresses hold at most {MAX_TLV_VALUE_LEN}")]
    IdentifierTooLong { identifier: String, len: usize },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a publish for {identifier:?} is already in progress")]
    InFlight { identifier: String },

    #[error(
        "publication failed at chapter {ordinal}; {} earlier chapter(s) remain published",
        .published.len()
    )]
    Chapter {
        ordinal: u32,
        published: Vec<PublishedChapterRef>,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "publication failed while publishing the manifest; all {} chapter(s) are published",
        .published.len()
    )]
    Manifest {
        published: Vec<PublishedChapterRef>,
        #[source]
        source: anyhow::Error,
    },
}

impl PublishError {
    /// Chapters that are live on the relay despite the failure.
    #[must_use]
    pub fn published_chapters(&self) -> &[PublishedChapterRef] {
        match self {
            Self::Chapter { published, .. } | Self::Manifest { published, .. } => published,
            Self::Validation(_) | Self::InFlight { .. } => &[],
        }
    }
}

/// Set of book identifiers with a publish in flight.
#[derive(Debug, Clone, Default)]
pub struct PublishLatch {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl PublishLatch {
    /// Returns `None` if `identifier` is already held.
    #[must_use]
    pub fn try_acquire(&self, identifier: &str) -> Option<LatchGuard> {
        let mut held = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(identifier.to_owned()) {
            return None;
        }
        Some(LatchGuard {
            latch: self.clone(),
            identifier: identifier.to_owned(),
        })
    }

    #[must_use]
    pub fn is_pending(&self, identifier: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identifier)
    }
}

#[derive(Debug)]
pub struct LatchGuard {
    latch: PublishLatch,
    identifier: String,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.identifier);
    }
}

pub struct Publisher {
    client: Arc<dyn EventPublish>,
    latch: PublishLatch,
}

impl Publisher {
    pub fn new(client: Arc<dyn EventPublish>) -> Self {
        Self {
            client,
            latch: PublishLatch::default(),
        }
    }

    #[must_use]
    pub fn with_latch(mut self, latch: PublishLatch) -> Self {
        self.latch = latch;
        self
    }

    pub async fn publish(
        &self,
        draft: &BookDraft,
        published_at: DateTime<Utc>,
    ) -> Result<PublishReport, PublishError> {
        let chapters = validate(draft)?;
        let identifier = draft.identifier.trim();

        let Some(_guard) = self.latch.try_acquire(identifier) else {
            return Err(PublishError::InFlight {
                identifier: identifier.to_owned(),
            });
        };

        let published_at = published_at.timestamp().to_string();
        tracing::info!(identifier, chapters = chapters.len(), "publishing book");

        let mut published = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            match self
                .publish_chapter(draft, identifier, chapter, &published_at)
                .await
            {
                Ok(chapter_ref) => published.push(chapter_ref),
                Err(source) => {
                    tracing::error!(
                        identifier,
                        ordinal = chapter.order,
                        published = published.len(),
                        ?source,
                        "chapter publish failed; earlier chapters stay published"
                    );
                    return Err(PublishError::Chapter {
                        ordinal: chapter.order,
                        published,
                        source,
                    });
                }
            }
        }

        let manifest = ManifestDocument {
            title: draft.title.trim().to_owned(),
            summary: draft.summary.trim().to_owned(),
            entries: published,
        };

        let result = self
            .publish_manifest(draft, identifier, &manifest, &published_at)
            .await;
        let (manifest_event, address) = match result {
            Ok(done) => done,
            Err(source) => {
                tracing::error!(identifier, ?source, "manifest publish failed");
                return Err(PublishError::Manifest {
                    published: manifest.entries,
                    source,
                });
            }
        };

        tracing::info!(
            identifier,
            chapters = manifest.entries.len(),
            address = %address,
            "book published"
        );

        Ok(PublishReport {
            identifier: identifier.to_owned(),
            chapters: manifest.entries,
            manifest: manifest_event,
            address,
        })
    }

    async fn publish_chapter(
        &self,
        draft: &BookDraft,
        book_identifier: &str,
        chapter: &ChapterRecord,
        published_at: &str,
    ) -> anyhow::Result<PublishedChapterRef> {
        let chapter_identifier = derive_chapter_identifier(book_identifier, chapter.order);

        let mut tags = vec![
            tag(TAG_IDENTIFIER, chapter_identifier.as_str()),
            tag(TAG_TITLE, chapter.title.as_str()),
            tag(TAG_BOOK, book_identifier),
            tag(TAG_CHAPTER, chapter.order.to_string()),
            tag(TAG_PUBLISHED_AT, published_at),
        ];
        if let Some(image) = cover_image(draft) {
            tags.push(tag(TAG_IMAGE, image));
        }

        let event = self
            .client
            .publish(EventDraft {
                kind: KIND_LONG_FORM,
                content: chapter.content.clone(),
                tags,
            })
            .await
            .with_context(|| format!("publish chapter {}", chapter.order))?;

        let address = BookAddress::new(event.kind, event.pubkey.as_str(), chapter_identifier)
            .encode()
            .context("encode chapter address")?;

        tracing::debug!(ordinal = chapter.order, id = %event.id, "chapter published");
        Ok(PublishedChapterRef {
            title: chapter.title.clone(),
            order: chapter.order,
            address,
        })
    }

    async fn publish_manifest(
        &self,
        draft: &BookDraft,
        identifier: &str,
        manifest: &ManifestDocument,
        published_at: &str,
    ) -> anyhow::Result<(Event, String)> {
        let mut tags = vec![
            tag(TAG_IDENTIFIER, identifier),
            tag(TAG_TITLE, manifest.title.as_str()),
            tag(TAG_PUBLISHED_AT, published_at),
        ];
        if !manifest.summary.is_empty() {
            tags.push(tag(TAG_SUMMARY, manifest.summary.as_str()));
        }
        if let Some(image) = cover_image(draft) {
            tags.push(tag(TAG_IMAGE, image));
        }
        for topic in &draft.topics {
            let topic = topic.trim();
            if !topic.is_empty() {
                tags.push(tag(TAG_TOPIC, topic));
            }
        }

        let event = self
            .client
            .publish(EventDraft {
                kind: KIND_LONG_FORM,
                content: manifest.to_markdown(),
                tags,
            })
            .await
            .context("publish manifest")?;

        let address = BookAddress::new(event.kind, event.pubkey.as_str(), identifier)
            .encode()
            .context("encode book address")?;
        Ok((event, address))
    }
}

/// Checks the draft and splits it. Nothing is published when this fails.
pub fn validate(draft: &BookDraft) -> Result<Vec<ChapterRecord>, ValidationError> {
    if draft.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    if draft.identifier.trim().is_empty() {
        return Err(ValidationError::MissingIdentifier);
    }
    if draft.content.trim().is_empty() {
        return Err(ValidationError::MissingContent);
    }
    let chapters = scan::split_chapters(&draft.content);
    if chapters.is_empty() {
        return Err(ValidationError::NoChapters);
    }
    // The last chapter carries the longest key.
    if let Some(last) = chapters.last() {
        let longest = derive_chapter_identifier(&draft.identifier, last.order);
        let len = longest.len();
        if len > MAX_TLV_VALUE_LEN {
            return Err(ValidationError::IdentifierTooLong {
                identifier: longest,
                len,
            });
        }
    }
    Ok(chapters)
}

fn cover_image(draft: &BookDraft) -> Option<&str> {
    draft
        .image
        .as_deref()
        .map(str::trim)
        .filter(|image| !image.is_empty())
}

pub async fn run(args: PublishArgs) -> anyhow::Result<()> {
    let config = Config::from_env()
        .context("load config")?
        .with_overrides(args.store.as_deref(), args.author.as_deref())
        .context("apply cli overrides")?;
    let author = config.require_author().context("resolve author")?;

    let path = PathBuf::from(&args.file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("read markdown: {}", path.display()))?;

    let mut draft = BookDraft::from_markdown(content);
    let title_overridden = args.title.is_some();
    if let Some(title) = args.title {
        draft.title = title;
    }
    match args.identifier {
        Some(identifier) => draft.identifier = identifier,
        None if title_overridden => draft.identifier = derive_book_identifier(&draft.title),
        None => {}
    }
    if let Some(summary) = args.summary {
        draft.summary = summary;
    }
    draft.image = args.image;
    draft.topics = args.topics;

    let relay = LocalFsRelay::new(&config.store_dir).with_author(author);
    let publisher = Publisher::new(Arc::new(relay));

    match publisher.publish(&draft, Utc::now()).await {
        Ok(report) => {
            println!(
                "published {} chapter(s) and the manifest for {}",
                report.chapters.len(),
                report.identifier
            );
            println!("{}", report.address);
            Ok(())
        }
        Err(err) => {
            for chapter in err.published_chapters() {
                tracing::warn!(
                    ordinal = chapter.order,
                    title = %chapter.title,
                    address = %chapter.address,
                    "chapter remains published"
                );
            }
            Err(err).context("publish book")
        }
    }
}
