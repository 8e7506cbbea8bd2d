use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Long-form content records. Books, chapters and manifests all use this kind.
pub const KIND_LONG_FORM: u32 = 30023;

pub const TAG_IDENTIFIER: &str = "d";
pub const TAG_TITLE: &str = "title";
pub const TAG_SUMMARY: &str = "summary";
pub const TAG_IMAGE: &str = "image";
pub const TAG_BOOK: &str = "book";
pub const TAG_CHAPTER: &str = "chapter";
pub const TAG_PUBLISHED_AT: &str = "published_at";
pub const TAG_TOPIC: &str = "t";

const WORDS_PER_MINUTE: usize = 200;

/// A stored record as returned by a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// First value of the first tag called `name`.
    #[must_use]
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        find_tag(&self.tags, name)
    }

    /// First value of every tag called `name`, in tag order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.tag_value(TAG_IDENTIFIER)
    }
}

/// An unsigned record handed to a publisher. The publisher assigns author, time and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub kind: u32,
    pub content: String,
    pub tags: Vec<Vec<String>>,
}

impl EventDraft {
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        find_tag(&self.tags, TAG_IDENTIFIER)
    }
}

fn find_tag<'a>(tags: &'a [Vec<String>], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.first().map(String::as_str) == Some(name))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}

#[must_use]
pub fn tag(name: &str, value: impl Into<String>) -> Vec<String> {
    vec![name.to_owned(), value.into()]
}

/// Record selector. Empty sets match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(rename = "#d", default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(rename = "#t", default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Tag names a record must not carry. Checked before `limit` is applied; not part of
    /// the relay wire format.
    #[serde(skip)]
    pub without_tags: Vec<String>,
}

impl Filter {
    #[must_use]
    pub fn long_form() -> Self {
        Self {
            kinds: vec![KIND_LONG_FORM],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    #[must_use]
    pub fn without_tag(mut self, name: impl Into<String>) -> Self {
        self.without_tags.push(name.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|a| a == &event.pubkey) {
            return false;
        }
        if !self.identifiers.is_empty()
            && !event
                .tag_values(TAG_IDENTIFIER)
                .any(|d| self.identifiers.iter().any(|want| want == d))
        {
            return false;
        }
        if !self.topics.is_empty()
            && !event
                .tag_values(TAG_TOPIC)
                .any(|t| self.topics.iter().any(|want| want == t))
        {
            return false;
        }
        if self
            .without_tags
            .iter()
            .any(|name| event.tag_value(name).is_some())
        {
            return false;
        }
        true
    }
}

/// Display metadata of a book, chapter or manifest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    pub title: String,
    pub identifier: String,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub published_at: i64,
    pub topics: Vec<String>,
}

impl BookMetadata {
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        let published_at = event
            .tag_value(TAG_PUBLISHED_AT)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(event.created_at);

        Self {
            title: event
                .tag_value(TAG_TITLE)
                .filter(|t| !t.is_empty())
                .unwrap_or("Untitled")
                .to_owned(),
            identifier: event.identifier().unwrap_or_default().to_owned(),
            summary: event.tag_value(TAG_SUMMARY).map(str::to_owned),
            image: event.tag_value(TAG_IMAGE).map(str::to_owned),
            published_at,
            topics: event.tag_values(TAG_TOPIC).map(str::to_owned).collect(),
        }
    }
}

/// Long-form record with a non-empty title and durable key.
#[must_use]
pub fn is_book_event(event: &Event) -> bool {
    event.kind == KIND_LONG_FORM
        && event.tag_value(TAG_TITLE).is_some_and(|t| !t.is_empty())
        && event.identifier().is_some_and(|d| !d.is_empty())
}

/// Minutes needed to read `content` at 200 words per minute, rounded up.
#[must_use]
pub fn estimate_reading_time(content: &str) -> usize {
    content.split_whitespace().count().div_ceil(WORDS_PER_MINUTE)
}

#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut = text.chars().take(max_chars).collect::<String>();
    format!("{}...", cut.trim())
}

/// Renders a unix timestamp as e.g. `March 4, 2025`.
#[must_use]
pub fn format_publish_date(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(date) => date.format("%B %-d, %Y").to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tags: Vec<Vec<String>>) -> Event {
        Event {
            id: "id".to_owned(),
            pubkey: "pk".to_owned(),
            created_at: 1_700_000_000,
            kind: KIND_LONG_FORM,
            tags,
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn metadata_defaults() {
        let meta = BookMetadata::from_event(&event(vec![]));
        assert_eq!(meta.title, "Untitled");
        assert_eq!(meta.identifier, "");
        assert_eq!(meta.published_at, 1_700_000_000);
        assert!(meta.topics.is_empty());
    }

    #[test]
    fn metadata_reads_tags() {
        let meta = BookMetadata::from_event(&event(vec![
            tag(TAG_IDENTIFIER, "dune"),
            tag(TAG_TITLE, "Dune"),
            tag(TAG_SUMMARY, "Spice."),
            tag(TAG_PUBLISHED_AT, "1600000000"),
            tag(TAG_TOPIC, "fiction"),
            tag(TAG_TOPIC, "scifi"),
        ]));
        assert_eq!(meta.title, "Dune");
        assert_eq!(meta.identifier, "dune");
        assert_eq!(meta.summary.as_deref(), Some("Spice."));
        assert_eq!(meta.published_at, 1_600_000_000);
        assert_eq!(meta.topics, vec!["fiction", "scifi"]);
    }

    #[test]
    fn book_events_need_title_and_identifier() {
        assert!(!is_book_event(&event(vec![tag(TAG_TITLE, "x")])));
        assert!(!is_book_event(&event(vec![
            tag(TAG_TITLE, ""),
            tag(TAG_IDENTIFIER, "x")
        ])));
        assert!(is_book_event(&event(vec![
            tag(TAG_TITLE, "x"),
            tag(TAG_IDENTIFIER, "x")
        ])));
    }

    #[test]
    fn filter_matching() {
        let e = event(vec![tag(TAG_IDENTIFIER, "dune"), tag(TAG_TOPIC, "scifi")]);
        assert!(Filter::long_form().matches(&e));
        assert!(Filter::long_form().author("pk").identifier("dune").matches(&e));
        assert!(!Filter::long_form().author("other").matches(&e));
        assert!(!Filter::long_form().identifier("emma").matches(&e));

        let mut topical = Filter::long_form();
        topical.topics = vec!["history".to_owned(), "scifi".to_owned()];
        assert!(topical.matches(&e));
        topical.topics = vec!["history".to_owned()];
        assert!(!topical.matches(&e));

        assert!(Filter::long_form().without_tag(TAG_CHAPTER).matches(&e));
        let chapter = event(vec![tag(TAG_IDENTIFIER, "dune:chapter:1"), tag(TAG_CHAPTER, "1")]);
        assert!(!Filter::long_form().without_tag(TAG_CHAPTER).matches(&chapter));
    }

    #[test]
    fn filter_serializes_tag_keys() -> anyhow::Result<()> {
        let json = serde_json::to_value(
            Filter::long_form()
                .identifier("dune")
                .without_tag(TAG_CHAPTER)
                .limit(1),
        )?;
        assert_eq!(
            json,
            serde_json::json!({"kinds": [30023], "#d": ["dune"], "limit": 1})
        );
        Ok(())
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(estimate_reading_time(""), 0);
        assert_eq!(estimate_reading_time("one"), 1);
        assert_eq!(estimate_reading_time(&"w ".repeat(201)), 2);
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("hello world", 6), "hello...");
    }

    #[test]
    fn publish_date_format() {
        assert_eq!(format_publish_date(1_700_000_000), "November 14, 2023");
    }
}
