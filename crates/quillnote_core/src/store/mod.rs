//! Note store contract shared by every persistence backend.
//!
//! # Responsibility
//! - Define the async `NoteStore` seam the workspace and the autosave
//!   scheduler depend on.
//! - Classify backend failures so callers can tell retryable outages from
//!   corrupt data and vanished rows.
//!
//! # Invariants
//! - `list_notes` returns `updated_at DESC, id ASC` order.
//! - `update_note` touches only the populated changeset fields and returns
//!   the canonical record carrying its fresh `updated_at`.
//! - Backends assign strictly monotonic `updated_at` values per instance,
//!   so consecutive saves of one note never tie on the sort key.

use crate::model::note::{NewNote, Note, NoteChangeset, NoteId, UserId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryNoteStore;
pub use sqlite::SqliteNoteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store failure taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// No record with this id; it may have been deleted concurrently.
    NotFound(NoteId),
    /// Transient backend failure; the same call may succeed on retry.
    Unavailable(String),
    /// Persisted data failed validation or decoding.
    InvalidRecord(String),
}

impl StoreError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::InvalidRecord(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Persistence contract for note records.
///
/// Implementations own identity and timestamp assignment. Callers own call
/// ordering; nothing here serializes concurrent updates to one note.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Lists all notes owned by `user_id`, most recently updated first.
    async fn list_notes(&self, user_id: UserId) -> StoreResult<Vec<Note>>;

    /// Creates one note from client-supplied fields and returns the
    /// canonical record.
    async fn create_note(&self, user_id: UserId, new_note: NewNote) -> StoreResult<Note>;

    /// Applies the populated changeset fields to one note and returns the
    /// canonical record. An empty changeset reads the record back without
    /// touching it.
    async fn update_note(&self, note_id: NoteId, changes: NoteChangeset) -> StoreResult<Note>;

    /// Deletes one note.
    async fn delete_note(&self, note_id: NoteId) -> StoreResult<()>;
}

/// Strictly monotonic epoch-millisecond source shared by the backends.
///
/// Wall time can tie across sub-millisecond successive updates; the list
/// sort key must not. Each draw returns at least `previous + 1`.
#[derive(Debug, Default)]
pub(crate) struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub(crate) fn next(&self) -> i64 {
        let now = epoch_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
