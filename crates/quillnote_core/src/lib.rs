//! Quillnote workspace core.
//!
//! Draft buffering, debounced autosave with strict per-note ordering, note
//! list projection, and heuristic content suggestions, built over pluggable
//! note stores and a watch-based auth session.

pub mod assistant;
pub mod autosave;
pub mod draft;
pub mod logging;
pub mod model;
pub mod projection;
pub mod session;
pub mod store;
pub mod workspace;

pub use autosave::{AutosaveConfig, AutosaveEvent, AutosaveHandle, SaveStatus};
pub use draft::DraftBuffer;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{NewNote, Note, NoteChangeset, NoteEdit, NoteId, Suggestions, UserId};
pub use projection::NoteFilter;
pub use session::{SessionContext, SessionWatch, UserProfile};
pub use store::{MemoryNoteStore, NoteStore, SqliteNoteStore, StoreError, StoreResult};
pub use workspace::{NoteWorkspace, WorkspaceConfig, WorkspaceError, WorkspaceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
