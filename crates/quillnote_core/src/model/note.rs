//! Note record and partial-update vocabulary.
//!
//! # Responsibility
//! - Define the canonical `Note` record shared by stores, autosave, and
//!   projections.
//! - Define the partial-update types (`NoteChangeset`, `NoteEdit`) that the
//!   draft buffer and the scheduler exchange.
//!
//! # Invariants
//! - `id` is stable for the lifetime of a note and never reused.
//! - `created_at` / `updated_at` are store-assigned epoch milliseconds;
//!   nothing in this module touches them.
//! - `suggestions` is a tagged optional: absence means the assistant has
//!   never produced a bundle for this note, and no field of the bundle is
//!   ever mistaken for user-authored text.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for notes.
pub type NoteId = Uuid;

/// Stable identifier for the owning user.
pub type UserId = Uuid;

/// Assistant-derived metadata, kept apart from user-authored fields.
///
/// Transported and stored as one bundle so a refresh replaces the previous
/// generation wholesale instead of mixing two generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    /// Proposed title derived from the content.
    pub title: String,
    /// Proposed summary derived from the content.
    pub summary: String,
    /// Proposed tags not already present on the note.
    pub suggested_tags: Vec<String>,
}

/// Canonical note record as the store last confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Short free-form summary line shown under the title.
    pub subtitle: String,
    pub content: String,
    /// Ordered and case-sensitive. Duplicates are discouraged, not rejected.
    pub tags: Vec<String>,
    /// Epoch milliseconds, assigned once at creation.
    pub created_at: i64,
    /// Epoch milliseconds, reassigned by the store on every update. This is
    /// the list sort key.
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

/// Client-supplied fields for note creation. Identity and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub subtitle: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl NewNote {
    /// Seed values used by the explicit "new note" action.
    pub fn placeholder() -> Self {
        Self {
            title: "New note".to_string(),
            subtitle: "A short summary of the note".to_string(),
            content: String::new(),
            tags: vec!["Label".to_string()],
        }
    }
}

/// Partial update for one note.
///
/// `None` fields are left untouched by the store; populated fields replace
/// the stored value wholesale (tags included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteChangeset {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub suggestions: Option<Suggestions>,
}

impl NoteChangeset {
    /// Whether no field is populated.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subtitle.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.suggestions.is_none()
    }

    /// Records one field edit, replacing any earlier value for that field.
    pub fn record(&mut self, edit: NoteEdit) {
        match edit {
            NoteEdit::Title(value) => self.title = Some(value),
            NoteEdit::Subtitle(value) => self.subtitle = Some(value),
            NoteEdit::Content(value) => self.content = Some(value),
            NoteEdit::Tags(values) => self.tags = Some(normalize_tags(&values)),
            NoteEdit::Suggestions(bundle) => self.suggestions = Some(bundle),
        }
    }

    /// Fills unpopulated fields from `older`, keeping this changeset's own
    /// values where both are set. Used to re-queue a failed flush beneath
    /// edits recorded after it.
    pub fn fill_from(&mut self, older: NoteChangeset) {
        if self.title.is_none() {
            self.title = older.title;
        }
        if self.subtitle.is_none() {
            self.subtitle = older.subtitle;
        }
        if self.content.is_none() {
            self.content = older.content;
        }
        if self.tags.is_none() {
            self.tags = older.tags;
        }
        if self.suggestions.is_none() {
            self.suggestions = older.suggestions;
        }
    }

    /// Applies the populated fields to `note`, leaving everything else as
    /// it was. Timestamps are store-owned and not touched here.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(value) = &self.title {
            note.title = value.clone();
        }
        if let Some(value) = &self.subtitle {
            note.subtitle = value.clone();
        }
        if let Some(value) = &self.content {
            note.content = value.clone();
        }
        if let Some(values) = &self.tags {
            note.tags = values.clone();
        }
        if let Some(bundle) = &self.suggestions {
            note.suggestions = Some(bundle.clone());
        }
    }

    /// Names of the populated fields, for diagnostics.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.subtitle.is_some() {
            fields.push("subtitle");
        }
        if self.content.is_some() {
            fields.push("content");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        if self.suggestions.is_some() {
            fields.push("suggestions");
        }
        fields
    }
}

/// One field-level edit produced by an editing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteEdit {
    Title(String),
    Subtitle(String),
    Content(String),
    /// Whole-set replacement; entries are trimmed and empties dropped.
    Tags(Vec<String>),
    /// Assistant side-channel refresh; never touches authored fields.
    Suggestions(Suggestions),
}

/// Trims one tag, returning `None` when nothing remains. A blank value in a
/// tag edit means "delete this tag".
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trims every entry and drops the blanks. Order and case are preserved;
/// duplicates pass through.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter().filter_map(|tag| normalize_tag(tag)).collect()
}
