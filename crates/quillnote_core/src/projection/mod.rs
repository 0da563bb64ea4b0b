//! Visible-notes projection.
//!
//! # Responsibility
//! - Derive the visible subset of the loaded collection for a free-text
//!   query.
//!
//! # Invariants
//! - Matching is a case-insensitive substring test over title, content, and
//!   every tag.
//! - The empty query matches everything.
//! - Input order is preserved; nothing is cached between runs.

use crate::model::note::Note;

/// Compiled query for the note list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    needle: String,
}

impl NoteFilter {
    /// Builds a filter from raw query text. The query is case-folded once
    /// here instead of per note.
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    /// Whether this filter matches everything.
    pub fn matches_all(&self) -> bool {
        self.needle.is_empty()
    }

    /// Whether one note is visible under this filter.
    pub fn matches(&self, note: &Note) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        note.title.to_lowercase().contains(&self.needle)
            || note.content.to_lowercase().contains(&self.needle)
            || note
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&self.needle))
    }

    /// Lazily filters `notes`, preserving their order. The iterator is
    /// cheap to rebuild, so callers re-run it per keystroke instead of
    /// caching results.
    pub fn filter<'f, 'n>(
        &'f self,
        notes: &'n [Note],
    ) -> impl Iterator<Item = &'n Note> + use<'f, 'n> {
        notes.iter().filter(move |note| self.matches(note))
    }
}
