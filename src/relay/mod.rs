//! Relays that live in this process: an in-memory one and one backed by a directory.
//!
//! Both stamp drafts with a configured author, compute the content-addressed id and keep
//! only the latest record per `(kind, author, d)` coordinate.

use std::collections::HashSet;

use sha2::{Digest as _, Sha256};

use crate::event::{Event, EventDraft, Filter};

mod local_fs;
mod memory;

pub use local_fs::LocalFsRelay;
pub use memory::MemoryRelay;

/// Fills in author, timestamp and id. The signature is left empty.
pub(crate) fn stamp(author: &str, created_at: i64, draft: EventDraft) -> Event {
    let id = event_id(author, created_at, draft.kind, &draft.tags, &draft.content);
    Event {
        id,
        pubkey: author.to_owned(),
        created_at,
        kind: draft.kind,
        tags: draft.tags,
        content: draft.content,
        sig: String::new(),
    }
}

/// sha256 over the canonical `[0, pubkey, created_at, kind, tags, content]` array.
pub(crate) fn event_id(
    pubkey: &str,
    created_at: i64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    let canonical = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

/// Same coordinate means the newer record supersedes the older one.
pub(crate) fn same_coordinate(a: &Event, b: &Event) -> bool {
    a.kind == b.kind && a.pubkey == b.pubkey && a.identifier() == b.identifier()
}

/// Union of the matches of every filter, newest first, each filter capped at its limit.
pub(crate) fn select<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    filters: &[Filter],
) -> Vec<Event> {
    let mut sorted = events.into_iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for filter in filters {
        let limit = filter.limit.unwrap_or(usize::MAX);
        for event in sorted.iter().filter(|e| filter.matches(e)).take(limit) {
            if seen.insert(event.id.clone()) {
                out.push((*event).clone());
            }
        }
    }
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KIND_LONG_FORM, TAG_IDENTIFIER, tag};

    fn draft(d: &str) -> EventDraft {
        EventDraft {
            kind: KIND_LONG_FORM,
            content: "body".to_owned(),
            tags: vec![tag(TAG_IDENTIFIER, d)],
        }
    }

    #[test]
    fn id_depends_on_every_field() {
        let base = stamp("pk", 10, draft("a"));
        assert_eq!(base.id.len(), 64);
        assert_eq!(stamp("pk", 10, draft("a")).id, base.id);
        assert_ne!(stamp("pk", 11, draft("a")).id, base.id);
        assert_ne!(stamp("pk2", 10, draft("a")).id, base.id);
        assert_ne!(stamp("pk", 10, draft("b")).id, base.id);
    }

    #[test]
    fn select_orders_and_limits() {
        let events = vec![
            stamp("pk", 1, draft("a")),
            stamp("pk", 3, draft("b")),
            stamp("pk", 2, draft("c")),
        ];
        let picked = select(&events, &[Filter::long_form().limit(2)]);
        let ds = picked
            .iter()
            .filter_map(Event::identifier)
            .collect::<Vec<_>>();
        assert_eq!(ds, vec!["b", "c"]);
    }

    #[test]
    fn select_deduplicates_across_filters() {
        let events = vec![stamp("pk", 1, draft("a"))];
        let picked = select(
            &events,
            &[Filter::long_form(), Filter::long_form().identifier("a")],
        );
        assert_eq!(picked.len(), 1);
    }
}
