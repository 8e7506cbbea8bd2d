//! The book manifest: a Markdown record that lists every chapter as a `nostr:` link.
//!
//! [`ManifestDocument::to_markdown`] writes it and [`extract_toc`] reads the links back.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// URI scheme that marks a link target as a protocol address rather than a web URL.
pub const LINK_SCHEME: &str = "nostr:";

pub const TOC_HEADING: &str = "## Table of Contents";

/// Link text stays on one line and holds no bare bracket. `\\`, `\[` and `\]` are
/// escaped characters; any other backslash is literal.
static TOC_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:[^\[\]\\\n]|\\[\\\[\]]|\\)+)\]\(nostr:([^)]+)\)")
        .expect("valid toc link regex")
});

/// A chapter that is already stored and reachable at `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedChapterRef {
    pub title: String,
    pub order: u32,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    pub title: String,
    pub summary: String,
    pub entries: Vec<PublishedChapterRef>,
}

impl ManifestDocument {
    /// Renders the canonical manifest.
    ///
    /// List numbers come from position in `entries`; the entries are not re-sorted.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("# {}\n\n", self.title));
        md.push_str(&format!("{}\n\n", self.summary));
        md.push_str(TOC_HEADING);
        md.push('\n');
        for (idx, entry) in self.entries.iter().enumerate() {
            md.push_str(&format!(
                "{}. [{}]({LINK_SCHEME}{})\n",
                idx + 1,
                escape_link_text(&entry.title),
                entry.address
            ));
        }
        md
    }
}

/// Collects every `[title](nostr:address)` link in document order.
///
/// Addresses are not validated here.
#[must_use]
pub fn extract_toc(markdown: Option<&str>) -> Vec<TocEntry> {
    let Some(markdown) = markdown else {
        return Vec::new();
    };

    TOC_LINK_RE
        .captures_iter(markdown)
        .map(|caps| TocEntry {
            title: unescape_link_text(&caps[1]),
            address: caps[2].to_owned(),
        })
        .collect()
}

fn is_escapable(ch: char) -> bool {
    matches!(ch, '\\' | '[' | ']')
}

fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_escapable(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Undoes [`escape_link_text`]. Other backslashes are kept as written.
fn unescape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next_if(|next| is_escapable(*next)) {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}
