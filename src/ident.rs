//! Durable keys for books and their chapters.
//!
//! A book is keyed by a slug derived from its title. Each chapter gets a key composed
//! from the book slug and its ordinal, so it is independently addressable while still
//! recognisable as part of the book.

const CHAPTER_SEPARATOR: char = ':';
const CHAPTER_WORD: &str = "chapter";

/// Lower-cases `title` and turns it into a hyphenated ASCII slug.
///
/// The result only contains `[a-z0-9-]` and never starts, ends with, or doubles a hyphen.
/// An empty result means the title has nothing usable and must not be published.
#[must_use]
pub fn derive_book_identifier(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
        // Everything else is dropped without splitting the surrounding word.
    }

    slug
}

/// Key of chapter `ordinal` (1-based) of the book keyed by `book_identifier`.
#[must_use]
pub fn derive_chapter_identifier(book_identifier: &str, ordinal: u32) -> String {
    format!("{book_identifier}{CHAPTER_SEPARATOR}{CHAPTER_WORD}{CHAPTER_SEPARATOR}{ordinal}")
}

/// Inverse of [`derive_chapter_identifier`].
///
/// Returns `None` for anything that was not produced by it, including ordinals with
/// leading zeros.
#[must_use]
pub fn parse_chapter_identifier(identifier: &str) -> Option<(&str, u32)> {
    let (rest, ordinal) = identifier.rsplit_once(CHAPTER_SEPARATOR)?;
    let (book, word) = rest.rsplit_once(CHAPTER_SEPARATOR)?;
    if word != CHAPTER_WORD || book.is_empty() {
        return None;
    }
    if ordinal.is_empty()
        || !ordinal.bytes().all(|b| b.is_ascii_digit())
        || (ordinal.len() > 1 && ordinal.starts_with('0'))
    {
        return None;
    }
    let ordinal = ordinal.parse::<u32>().ok()?;
    if ordinal == 0 {
        return None;
    }
    Some((book, ordinal))
}
