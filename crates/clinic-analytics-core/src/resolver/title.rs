//! Event title parsing.
//!
//! Staff encode a booking in the event title as `N:<name>T:<phone>`. The
//! grammar is strict: anything else is dropped, and titles that look like an
//! attempt at the grammar are reported as mismatches instead of guessed at.

use std::sync::LazyLock;

use regex::Regex;

static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*n:(.*?)t:(.*)$").unwrap());

/// Name and phone extracted from a conforming title, both trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub name: String,
    pub phone: String,
}

/// Outcome of classifying a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleMatch {
    /// Title follows the grammar
    Visit(ParsedTitle),
    /// Title mentions both markers but breaks the grammar
    Mismatch,
    /// Title is not a booking (lunch blocks, notes, ...)
    Unrelated,
}

/// Parse a title, returning the pair only on a full grammar match.
pub fn parse_title(title: &str) -> Option<ParsedTitle> {
    let captures = TITLE_PATTERN.captures(title)?;

    let name = captures.get(1)?.as_str().trim();
    let phone = captures.get(2)?.as_str().trim();
    if name.is_empty() || phone.is_empty() {
        return None;
    }

    Some(ParsedTitle {
        name: name.to_string(),
        phone: phone.to_string(),
    })
}

/// Classify a title as a visit, a probable mismatch, or unrelated.
pub fn classify_title(title: &str) -> TitleMatch {
    if let Some(parsed) = parse_title(title) {
        return TitleMatch::Visit(parsed);
    }

    let lower = title.to_lowercase();
    if lower.contains("n:") && lower.contains("t:") {
        TitleMatch::Mismatch
    } else {
        TitleMatch::Unrelated
    }
}
