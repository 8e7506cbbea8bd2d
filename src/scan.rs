//! Line scanner that turns authored Markdown into a book header and chapters.
//!
//! Only two markers are recognised: `# ` (book title) and `## ` (chapter boundary).
//! Deeper headings such as `### ` are ordinary text. The scanner never fails: a
//! document without the markers simply yields an empty header or no chapters.

use std::path::PathBuf;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::SplitArgs;

const TITLE_MARKER: &str = "# ";
const CHAPTER_MARKER: &str = "## ";

/// Maximum length of an extracted summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub title: String,
    pub content: String,
    pub order: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookHeader {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedBook {
    pub header: BookHeader,
    pub chapters: Vec<ChapterRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeTitle,
    InSummary,
    InChapter,
}

/// Scans `markdown` once and returns both the header and the chapters.
#[must_use]
pub fn scan(markdown: &str) -> ScannedBook {
    let mut state = State::BeforeTitle;
    let mut title = String::new();
    let mut summary_parts: Vec<&str> = Vec::new();
    let mut chapters = Vec::new();
    let mut current: Option<ChapterRecord> = None;

    for raw_line in markdown.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);

        if let Some(heading) = line.strip_prefix(CHAPTER_MARKER) {
            if let Some(done) = current.take() {
                chapters.push(done);
            }
            let order = u32::try_from(chapters.len() + 1).unwrap_or(u32::MAX);
            current = Some(ChapterRecord {
                title: heading.trim().to_owned(),
                content: String::new(),
                order,
            });
            state = State::InChapter;
            continue;
        }

        match state {
            State::BeforeTitle => {
                if let Some(heading) = line.strip_prefix(TITLE_MARKER) {
                    title = heading.trim().to_owned();
                    state = State::InSummary;
                }
            }
            State::InSummary => {
                let text = line.trim();
                if !text.is_empty() {
                    summary_parts.push(text);
                }
            }
            State::InChapter => {
                if let Some(chapter) = current.as_mut() {
                    chapter.content.push_str(raw_line);
                }
            }
        }
    }

    if let Some(done) = current.take() {
        chapters.push(done);
    }

    let summary = summary_parts
        .join(" ")
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect::<String>();

    tracing::debug!(
        title = %title,
        summary_chars = summary.chars().count(),
        chapters = chapters.len(),
        "scanned markdown"
    );

    ScannedBook {
        header: BookHeader { title, summary },
        chapters,
    }
}

/// Splits `markdown` into chapters at every `## ` line.
///
/// Lines before the first boundary belong to the book header and are dropped.
#[must_use]
pub fn split_chapters(markdown: &str) -> Vec<ChapterRecord> {
    scan(markdown).chapters
}

/// Finds the first `# ` heading and the prose that follows it up to the first chapter.
#[must_use]
pub fn extract_header(markdown: &str) -> BookHeader {
    scan(markdown).header
}

pub fn run(args: SplitArgs) -> anyhow::Result<()> {
    let path = PathBuf::from(&args.file);
    let markdown = std::fs::read_to_string(&path)
        .with_context(|| format!("read markdown: {}", path.display()))?;

    let scanned = scan(&markdown);
    if scanned.chapters.is_empty() {
        tracing::warn!(file = %path.display(), "no `## ` chapter headings found");
    }

    let yaml = serde_yaml::to_string(&scanned).context("serialize split result")?;
    print!("{yaml}");
    Ok(())
}
