//! In-process note store.
//!
//! # Responsibility
//! - Provide the `NoteStore` contract without external state, for tests and
//!   the demo binary.
//! - Offer instrumentation hooks (completed-update log, injected failures,
//!   injected latency) that the autosave property tests lean on.
//!
//! # Invariants
//! - `updated_at` values are strictly monotonic per instance.
//! - An injected failure consumes its budget before the target is looked
//!   up, so it also covers updates of vanished notes.

use crate::model::note::{normalize_tags, NewNote, Note, NoteChangeset, NoteId, UserId};
use crate::store::{MonotonicClock, NoteStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredNote {
    owner: UserId,
    note: Note,
}

/// Memory-backed store with fault and latency injection.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<HashMap<NoteId, StoredNote>>,
    clock: MonotonicClock,
    failing_updates: AtomicU32,
    update_latency: Mutex<Option<Duration>>,
    completed_updates: Mutex<Vec<(NoteId, NoteChangeset)>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` update calls fail with a transient error.
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Adds an artificial delay inside every update call.
    pub async fn set_update_latency(&self, latency: Option<Duration>) {
        *self.update_latency.lock().await = latency;
    }

    /// Changesets of every successfully applied update, oldest first.
    pub async fn completed_updates(&self) -> Vec<(NoteId, NoteChangeset)> {
        self.completed_updates.lock().await.clone()
    }

    fn take_injected_failure(&self) -> bool {
        let mut remaining = self.failing_updates.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.failing_updates.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => remaining = actual,
            }
        }
        false
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list_notes(&self, user_id: UserId) -> StoreResult<Vec<Note>> {
        let notes = self.notes.lock().await;
        let mut owned: Vec<Note> = notes
            .values()
            .filter(|stored| stored.owner == user_id)
            .map(|stored| stored.note.clone())
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn create_note(&self, user_id: UserId, new_note: NewNote) -> StoreResult<Note> {
        let stamp = self.clock.next();
        let note = Note {
            id: Uuid::new_v4(),
            title: new_note.title,
            subtitle: new_note.subtitle,
            content: new_note.content,
            tags: normalize_tags(&new_note.tags),
            created_at: stamp,
            updated_at: stamp,
            suggestions: None,
        };
        self.notes.lock().await.insert(
            note.id,
            StoredNote {
                owner: user_id,
                note: note.clone(),
            },
        );
        debug!(
            "event=note_create module=store backend=memory status=ok note_id={}",
            note.id
        );
        Ok(note)
    }

    async fn update_note(&self, note_id: NoteId, changes: NoteChangeset) -> StoreResult<Note> {
        if changes.is_empty() {
            let notes = self.notes.lock().await;
            let stored = notes.get(&note_id).ok_or(StoreError::NotFound(note_id))?;
            return Ok(stored.note.clone());
        }

        let latency = *self.update_latency.lock().await;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        if self.take_injected_failure() {
            debug!(
                "event=note_update module=store backend=memory status=error note_id={note_id} error=injected"
            );
            return Err(StoreError::Unavailable(
                "injected update failure".to_string(),
            ));
        }

        let mut notes = self.notes.lock().await;
        let stored = notes
            .get_mut(&note_id)
            .ok_or(StoreError::NotFound(note_id))?;
        changes.apply_to(&mut stored.note);
        stored.note.updated_at = self.clock.next();
        let canonical = stored.note.clone();
        drop(notes);

        debug!(
            "event=note_update module=store backend=memory status=ok note_id={note_id} fields={}",
            changes.field_names().join(",")
        );
        self.completed_updates.lock().await.push((note_id, changes));
        Ok(canonical)
    }

    async fn delete_note(&self, note_id: NoteId) -> StoreResult<()> {
        let mut notes = self.notes.lock().await;
        if notes.remove(&note_id).is_none() {
            return Err(StoreError::NotFound(note_id));
        }
        debug!("event=note_delete module=store backend=memory status=ok note_id={note_id}");
        Ok(())
    }
}
