//! Heuristic content assistant.
//!
//! # Responsibility
//! - Derive a suggested title, summary, and tag set from note text.
//!
//! # Invariants
//! - Pure: identical input yields identical output, no stored state, no
//!   randomness.
//! - Advisory: nothing here writes to a note; callers decide what to apply.
//! - Blank input yields "nothing to suggest", never an error.

use crate::model::note::Suggestions;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Tokens shorter than this never reach a suggested title.
const TITLE_MIN_TOKEN_CHARS: usize = 4;
/// Titles use at most this many qualifying tokens.
const TITLE_MAX_TOKENS: usize = 4;
/// Summaries keep this many leading sentences.
const SUMMARY_MAX_SENTENCES: usize = 2;
/// Words shorter than this never become a suggested tag.
const TAG_MIN_WORD_CHARS: usize = 6;
/// At most this many tags are suggested per pass.
const TAG_MAX_SUGGESTIONS: usize = 3;
/// Content must exceed this length before milestone refreshes start.
const REFRESH_MIN_CHARS: usize = 100;
/// A refresh fires only at exact multiples of this length.
const REFRESH_STRIDE_CHARS: usize = 200;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\W+").expect("valid word split regex"));

/// Proposes a title: the first qualifying whitespace tokens, joined and
/// capitalized. Returns `None` for blank content or when no token
/// qualifies.
pub fn suggest_title(content: &str) -> Option<String> {
    let joined = content
        .split_whitespace()
        .filter(|word| word.chars().count() >= TITLE_MIN_TOKEN_CHARS)
        .take(TITLE_MAX_TOKENS)
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        return None;
    }
    Some(capitalize_first(&joined))
}

/// Proposes a summary: the first sentences (split on `.`), trimmed and
/// re-joined. A trailing period marks a truncated summary. Returns `None`
/// when no non-empty sentence exists.
pub fn suggest_summary(content: &str) -> Option<String> {
    let sentences: Vec<&str> = content
        .split('.')
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect();
    if sentences.is_empty() {
        return None;
    }

    let mut summary = sentences
        .iter()
        .take(SUMMARY_MAX_SENTENCES)
        .copied()
        .collect::<Vec<_>>()
        .join(". ");
    if sentences.len() > SUMMARY_MAX_SENTENCES {
        summary.push('.');
    }
    Some(summary)
}

/// Proposes capitalized keywords in first-seen order, excluding tags
/// already on the note. Deduplication and the size cap run before the
/// exclusion, so fewer than the cap may come back.
pub fn suggest_tags(content: &str, existing_tags: &[String]) -> Vec<String> {
    let lowered = content.to_lowercase();
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();

    for word in NON_WORD.split(&lowered) {
        if word.chars().count() < TAG_MIN_WORD_CHARS {
            continue;
        }
        if !seen.insert(word.to_string()) {
            continue;
        }
        suggestions.push(capitalize_first(word));
        if suggestions.len() == TAG_MAX_SUGGESTIONS {
            break;
        }
    }

    suggestions.retain(|tag| !existing_tags.contains(tag));
    suggestions
}

/// Derives the full bundle, or `None` when the content offers nothing to
/// suggest at all.
pub fn suggest(content: &str, existing_tags: &[String]) -> Option<Suggestions> {
    let title = suggest_title(content);
    let summary = suggest_summary(content);
    let suggested_tags = suggest_tags(content, existing_tags);

    if title.is_none() && summary.is_none() && suggested_tags.is_empty() {
        return None;
    }
    Some(Suggestions {
        title: title.unwrap_or_default(),
        summary: summary.unwrap_or_default(),
        suggested_tags,
    })
}

/// Whether a content edit sits on a refresh milestone: long enough to be
/// worth summarizing and at an exact length stride, so the bundle refreshes
/// sparsely while the user types.
pub fn at_refresh_milestone(content: &str) -> bool {
    let length = content.chars().count();
    length > REFRESH_MIN_CHARS && length % REFRESH_STRIDE_CHARS == 0
}

fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
