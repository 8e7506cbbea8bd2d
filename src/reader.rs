//! Reading side: from an address to a book, its table of contents and its chapters.
//!
//! Every fetch is bounded by a deadline and a caller cancellation token. Timeouts,
//! cancellations, relay errors and undecodable addresses all read as "not found".

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::address::BookAddress;
use crate::cli::{ListArgs, ReadArgs, TocArgs};
use crate::client::{EventQuery, query_with_deadline};
use crate::config::{Config, DEFAULT_LIST_LIMIT};
use crate::event::{
    BookMetadata, Event, Filter, KIND_LONG_FORM, TAG_BOOK, TAG_CHAPTER, estimate_reading_time,
    format_publish_date, is_book_event, truncate_text,
};
use crate::manifest::{TocEntry, extract_toc};
use crate::relay::LocalFsRelay;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub authors: Vec<String>,
    pub topics: Vec<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            authors: Vec::new(),
            topics: Vec::new(),
        }
    }
}

/// What the reader shows for one opened address.
#[derive(Debug, Clone)]
pub struct ReadingView {
    pub address: BookAddress,
    pub event: Event,
    pub metadata: BookMetadata,
    /// Manifest of the book this record belongs to; the record itself when it is the manifest.
    pub root: Option<Event>,
    pub toc: Vec<TocEntry>,
    /// Index into `toc` of the opened record, when it is one of the chapters.
    pub position: Option<usize>,
}

impl ReadingView {
    #[must_use]
    pub fn is_manifest(&self) -> bool {
        self.root.as_ref().is_some_and(|root| root.id == self.event.id)
    }

    #[must_use]
    pub fn current(&self) -> Option<&TocEntry> {
        self.toc.get(self.position?)
    }

    /// The chapter after this one; from the manifest, the first chapter.
    #[must_use]
    pub fn next(&self) -> Option<&TocEntry> {
        match self.position {
            Some(idx) => self.toc.get(idx + 1),
            None if self.is_manifest() => self.toc.first(),
            None => None,
        }
    }

    #[must_use]
    pub fn previous(&self) -> Option<&TocEntry> {
        self.toc.get(self.position?.checked_sub(1)?)
    }

    #[must_use]
    pub fn reading_time_minutes(&self) -> usize {
        estimate_reading_time(&self.event.content)
    }
}

/// One TOC entry with its fetched chapter, if it could be loaded.
#[derive(Debug, Clone)]
pub struct ResolvedChapter {
    pub entry: TocEntry,
    pub event: Option<Event>,
}

pub struct Reader {
    client: Arc<dyn EventQuery>,
    timeout: Duration,
}

impl Reader {
    pub fn new(client: Arc<dyn EventQuery>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch(&self, filters: &[Filter], cancel: &CancellationToken) -> Vec<Event> {
        match query_with_deadline(self.client.as_ref(), filters, cancel, self.timeout).await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(%err, ?filters, "could not load records");
                Vec::new()
            }
        }
    }

    /// The book record `identifier` by `author`.
    pub async fn book(
        &self,
        author: &str,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Option<Event> {
        let filter = Filter::long_form()
            .author(author)
            .identifier(identifier)
            .limit(1);
        self.fetch(&[filter], cancel)
            .await
            .into_iter()
            .find(is_book_event)
    }

    /// The manifest keyed `slug` by `author`.
    pub async fn book_root(
        &self,
        slug: &str,
        author: &str,
        cancel: &CancellationToken,
    ) -> Option<Event> {
        let filter = Filter::long_form()
            .author(author)
            .identifier(slug)
            .without_tag(TAG_CHAPTER)
            .limit(1);
        self.fetch(&[filter], cancel).await.into_iter().next()
    }

    /// Book manifests matching `options`. Chapter records are left out.
    pub async fn list_books(
        &self,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Vec<Event> {
        let filter = Filter {
            authors: options.authors.clone(),
            topics: options.topics.clone(),
            ..Filter::long_form()
                .without_tag(TAG_CHAPTER)
                .limit(options.limit)
        };
        let mut books = self.fetch(&[filter], cancel).await;
        books.retain(is_book_event);
        books
    }

    /// Opens `address` (a book or a chapter) and resolves the table of contents it belongs to.
    pub async fn open(&self, address: &str, cancel: &CancellationToken) -> Option<ReadingView> {
        let decoded = match BookAddress::decode(address) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(address, %err, "malformed address");
                return None;
            }
        };
        if decoded.kind != KIND_LONG_FORM {
            tracing::warn!(address, kind = decoded.kind, "unsupported record kind");
            return None;
        }

        let event = self
            .book(&decoded.author, &decoded.identifier, cancel)
            .await?;
        let metadata = BookMetadata::from_event(&event);

        let slug = event
            .tag_value(TAG_BOOK)
            .or_else(|| event.identifier())
            .unwrap_or_default()
            .to_owned();
        let root = if slug == metadata.identifier {
            Some(event.clone())
        } else {
            self.book_root(&slug, &event.pubkey, cancel).await
        };

        let toc = extract_toc(root.as_ref().map(|r| r.content.as_str()));
        let position = toc.iter().position(|entry| {
            BookAddress::decode(&entry.address).is_ok_and(|a| {
                a.kind == event.kind
                    && a.author == event.pubkey
                    && a.identifier == metadata.identifier
            })
        });

        tracing::debug!(
            identifier = %metadata.identifier,
            book = %slug,
            entries = toc.len(),
            ?position,
            "opened record"
        );

        Some(ReadingView {
            address: decoded,
            event,
            metadata,
            root,
            toc,
            position,
        })
    }

    /// Fetches the chapter a TOC entry points at.
    pub async fn chapter(&self, entry: &TocEntry, cancel: &CancellationToken) -> Option<Event> {
        let address = match BookAddress::decode(&entry.address) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(address = %entry.address, %err, "malformed chapter address");
                return None;
            }
        };
        self.book(&address.author, &address.identifier, cancel).await
    }

    /// Resolves a book address into its chapters in reading order, one fetch at a time.
    pub async fn reading_sequence(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Option<Vec<ResolvedChapter>> {
        let view = self.open(address, cancel).await?;
        let mut chapters = Vec::with_capacity(view.toc.len());
        for entry in view.toc {
            let event = self.chapter(&entry, cancel).await;
            chapters.push(ResolvedChapter { entry, event });
        }
        Some(chapters)
    }
}

fn reader_from_config(store: Option<&str>, timeout_ms: Option<u64>) -> anyhow::Result<Reader> {
    let mut config = Config::from_env()
        .context("load config")?
        .with_overrides(store, None)
        .context("apply cli overrides")?;
    if let Some(ms) = timeout_ms {
        config.fetch_timeout = Duration::from_millis(ms);
    }
    let relay = LocalFsRelay::new(&config.store_dir);
    Ok(Reader::new(Arc::new(relay), config.fetch_timeout))
}

pub async fn run_read(args: ReadArgs) -> anyhow::Result<()> {
    let reader = reader_from_config(args.store.as_deref(), args.timeout_ms)?;
    let cancel = CancellationToken::new();
    let Some(view) = reader.open(&args.address, &cancel).await else {
        anyhow::bail!("not found: could not load {}", args.address);
    };

    let meta = &view.metadata;
    println!("# {}", meta.title);
    println!();
    println!(
        "{} · {} min read",
        format_publish_date(meta.published_at),
        view.reading_time_minutes()
    );
    if let Some(summary) = meta.summary.as_deref().filter(|s| !s.is_empty()) {
        println!();
        println!("{summary}");
    }
    if !meta.topics.is_empty() {
        println!("topics: {}", meta.topics.join(", "));
    }

    if !view.is_manifest() {
        println!();
        print!("{}", view.event.content);
        if !view.event.content.ends_with('\n') {
            println!();
        }
    }

    if !view.toc.is_empty() {
        println!();
        println!("## Contents");
        print_toc(&view);
    }

    if let Some(prev) = view.previous() {
        println!("previous: {} {}", prev.title, prev.address);
    }
    if let Some(next) = view.next() {
        println!("next: {} {}", next.title, next.address);
    }
    Ok(())
}

pub async fn run_toc(args: TocArgs) -> anyhow::Result<()> {
    let reader = reader_from_config(args.store.as_deref(), args.timeout_ms)?;
    let cancel = CancellationToken::new();
    let Some(view) = reader.open(&args.address, &cancel).await else {
        anyhow::bail!("not found: could not load {}", args.address);
    };
    if view.toc.is_empty() {
        tracing::info!(address = %args.address, "record has no table of contents");
    }
    print_toc(&view);
    Ok(())
}

pub async fn run_list(args: ListArgs) -> anyhow::Result<()> {
    let config = Config::from_env()
        .context("load config")?
        .with_overrides(args.store.as_deref(), None)
        .context("apply cli overrides")?;
    let reader = Reader::new(
        Arc::new(LocalFsRelay::new(&config.store_dir)),
        config.fetch_timeout,
    );

    let options = ListOptions {
        limit: args.limit.unwrap_or(config.list_limit),
        authors: args.authors,
        topics: args.topics,
    };
    let cancel = CancellationToken::new();
    for book in reader.list_books(&options, &cancel).await {
        let meta = BookMetadata::from_event(&book);
        let address = BookAddress::new(book.kind, book.pubkey.as_str(), meta.identifier.as_str())
            .encode()
            .with_context(|| format!("encode address for {}", meta.identifier))?;
        let summary = meta
            .summary
            .as_deref()
            .map(|s| truncate_text(s, 80))
            .unwrap_or_default();
        println!(
            "{address}\t{}\t{}\t{summary}",
            meta.title,
            format_publish_date(meta.published_at)
        );
    }
    Ok(())
}

fn print_toc(view: &ReadingView) {
    for (idx, entry) in view.toc.iter().enumerate() {
        let marker = if view.position == Some(idx) { ">" } else { " " };
        println!("{marker} {}. {}\t{}", idx + 1, entry.title, entry.address);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::publish::{BookDraft, Publisher};
    use crate::relay::MemoryRelay;

    const AUTHOR: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

    async fn published() -> anyhow::Result<(Arc<MemoryRelay>, String)> {
        let relay = Arc::new(MemoryRelay::new(AUTHOR));
        let report = Publisher::new(relay.clone())
            .publish(
                &BookDraft::from_markdown(
                    "# Dune\n\nSpice.\n\n## One\nA\n## Two\nB\n## Three\nC\n",
                ),
                Utc::now(),
            )
            .await?;
        Ok((relay, report.address))
    }

    fn reader(relay: Arc<MemoryRelay>) -> Reader {
        Reader::new(relay, Duration::from_millis(3000))
    }

    #[tokio::test]
    async fn opening_the_manifest_lists_chapters() -> anyhow::Result<()> {
        let (relay, address) = published().await?;
        let view = reader(relay)
            .open(&address, &CancellationToken::new())
            .await
            .context("book should open")?;

        assert!(view.is_manifest());
        assert_eq!(view.metadata.title, "Dune");
        let titles = view.toc.iter().map(|e| e.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        assert_eq!(view.position, None);
        assert_eq!(view.next().map(|e| e.title.as_str()), Some("One"));
        assert!(view.previous().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn opening_a_chapter_finds_its_book() -> anyhow::Result<()> {
        let (relay, address) = published().await?;
        let reader = reader(relay);
        let cancel = CancellationToken::new();
        let book = reader.open(&address, &cancel).await.context("book")?;

        let second = &book.toc[1];
        let view = reader
            .open(&second.address, &cancel)
            .await
            .context("chapter should open")?;
        assert!(!view.is_manifest());
        assert_eq!(view.event.content, "B\n");
        assert_eq!(view.position, Some(1));
        assert_eq!(view.current().map(|e| e.title.as_str()), Some("Two"));
        assert_eq!(view.previous().map(|e| e.title.as_str()), Some("One"));
        assert_eq!(view.next().map(|e| e.title.as_str()), Some("Three"));
        Ok(())
    }

    #[tokio::test]
    async fn reading_sequence_follows_toc_order() -> anyhow::Result<()> {
        let (relay, address) = published().await?;
        let chapters = reader(relay)
            .reading_sequence(&address, &CancellationToken::new())
            .await
            .context("sequence")?;
        let bodies = chapters
            .iter()
            .map(|c| c.event.as_ref().map(|e| e.content.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec![Some("A\n"), Some("B\n"), Some("C\n")]);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_or_unknown_addresses_are_not_found() -> anyhow::Result<()> {
        let (relay, _) = published().await?;
        let reader = reader(relay);
        let cancel = CancellationToken::new();
        assert!(reader.open("naddr1garbage", &cancel).await.is_none());

        let missing = BookAddress::new(KIND_LONG_FORM, AUTHOR, "emma").encode()?;
        assert!(reader.open(&missing, &cancel).await.is_none());

        let other_kind = BookAddress::new(1, AUTHOR, "dune").encode()?;
        assert!(reader.open(&other_kind, &cancel).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn listing_filters_books() -> anyhow::Result<()> {
        let (relay, _) = published().await?;
        let reader = reader(relay);
        let cancel = CancellationToken::new();
        let all = reader.list_books(&ListOptions::default(), &cancel).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].identifier(), Some("dune"));

        let none = reader
            .list_books(
                &ListOptions {
                    topics: vec!["poetry".to_owned()],
                    ..ListOptions::default()
                },
                &cancel,
            )
            .await;
        assert!(none.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn chapters_do_not_crowd_books_out_of_a_page() -> anyhow::Result<()> {
        let relay = Arc::new(MemoryRelay::new(AUTHOR));
        let publisher = Publisher::new(relay.clone());
        let now = Utc::now();
        for title in ["First", "Second"] {
            let chapters = (1..=4)
                .map(|n| format!("## Part {n}\ntext\n"))
                .collect::<String>();
            publisher
                .publish(&BookDraft::from_markdown(format!("# {title}\n\n{chapters}")), now)
                .await?;
        }
        assert_eq!(relay.len().await, 10);

        let reader = reader(relay);
        let cancel = CancellationToken::new();
        let page = reader
            .list_books(
                &ListOptions {
                    limit: 2,
                    ..ListOptions::default()
                },
                &cancel,
            )
            .await;
        let mut ids = page
            .iter()
            .filter_map(Event::identifier)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, vec!["first", "second"]);

        let one = reader
            .list_books(
                &ListOptions {
                    limit: 1,
                    ..ListOptions::default()
                },
                &cancel,
            )
            .await;
        assert_eq!(one.len(), 1);
        assert!(one[0].tag_value(TAG_CHAPTER).is_none());
        Ok(())
    }
}
