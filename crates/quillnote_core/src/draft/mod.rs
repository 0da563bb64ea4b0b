//! Draft buffer for the note being edited.
//!
//! # Responsibility
//! - Accumulate uncommitted field edits between autosave flushes.
//! - Hand the whole pending changeset to the scheduler atomically.
//!
//! # Invariants
//! - Last write wins per field within one window.
//! - `take` yields either everything pending or nothing; a flush never sees
//!   half of a window.
//! - An empty buffer never produces a flush.

use crate::model::note::{NoteChangeset, NoteEdit, NoteId};

/// Pending, uncommitted edits for one note.
#[derive(Debug)]
pub struct DraftBuffer {
    note_id: NoteId,
    pending: NoteChangeset,
}

impl DraftBuffer {
    /// Creates an empty buffer bound to one note.
    pub fn new(note_id: NoteId) -> Self {
        Self {
            note_id,
            pending: NoteChangeset::default(),
        }
    }

    /// Note this buffer belongs to.
    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    /// Records one field edit; a later value for the same field replaces
    /// the earlier one.
    pub fn record(&mut self, edit: NoteEdit) {
        self.pending.record(edit);
    }

    /// Whether any field is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending state, for layering over the stale canonical record.
    pub fn pending(&self) -> &NoteChangeset {
        &self.pending
    }

    /// Takes the whole pending changeset, leaving the buffer empty.
    /// Returns `None` when nothing changed, so callers cannot submit no-op
    /// flushes.
    pub fn take(&mut self) -> Option<NoteChangeset> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Re-queues a failed flush beneath edits recorded after it: fields the
    /// user touched since keep their newer values.
    pub fn restore(&mut self, failed: NoteChangeset) {
        self.pending.fill_from(failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn successive_edits_to_one_field_keep_the_last() {
        let mut buffer = DraftBuffer::new(Uuid::new_v4());
        buffer.record(NoteEdit::Title("a".to_string()));
        buffer.record(NoteEdit::Title("ab".to_string()));
        buffer.record(NoteEdit::Title("abc".to_string()));

        let changes = buffer.take().expect("pending edits");
        assert_eq!(changes.title.as_deref(), Some("abc"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn take_refuses_noop_flushes() {
        let mut buffer = DraftBuffer::new(Uuid::new_v4());
        assert!(buffer.take().is_none());

        buffer.record(NoteEdit::Content("x".to_string()));
        assert!(buffer.take().is_some());
        assert!(buffer.take().is_none());
    }

    #[test]
    fn restore_slots_failed_fields_beneath_newer_edits() {
        let mut buffer = DraftBuffer::new(Uuid::new_v4());
        buffer.record(NoteEdit::Title("old".to_string()));
        buffer.record(NoteEdit::Content("body".to_string()));
        let failed = buffer.take().expect("first window");

        // The user kept typing while the flush was failing.
        buffer.record(NoteEdit::Title("new".to_string()));
        buffer.restore(failed);

        let merged = buffer.take().expect("merged window");
        assert_eq!(merged.title.as_deref(), Some("new"));
        assert_eq!(merged.content.as_deref(), Some("body"));
    }

    #[test]
    fn buffer_stays_bound_to_its_note() {
        let note_id = Uuid::new_v4();
        let buffer = DraftBuffer::new(note_id);
        assert_eq!(buffer.note_id(), note_id);
    }
}
