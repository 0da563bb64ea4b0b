//! Note workspace orchestration.
//!
//! # Responsibility
//! - Hold one user's loaded collection and the active-note index.
//! - Route field edits into the active note's autosave scheduler.
//! - Apply canonical records coming back from the scheduler, guarded by
//!   note identity so stale completions cannot corrupt a different note.
//!
//! # Invariants
//! - The active index stays in range whenever the collection is non-empty.
//! - Selecting away from a note flushes its pending edits first; deleting
//!   the active note discards them explicitly.
//! - Canonical records replace notes in place; store order re-asserts on
//!   the next full load, not mid-session.

use crate::assistant;
use crate::autosave::{AutosaveConfig, AutosaveEvent, AutosaveHandle, SaveStatus};
use crate::model::note::{
    normalize_tag, normalize_tags, NewNote, Note, NoteEdit, NoteId, UserId,
};
use crate::projection::NoteFilter;
use crate::store::{NoteStore, StoreError};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Workspace tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Scheduler settings applied to every note editor.
    pub autosave: AutosaveConfig,
    /// Refresh the suggestion bundle at content-length milestones.
    pub auto_suggest: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            autosave: AutosaveConfig::default(),
            auto_suggest: true,
        }
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Workspace use-case errors.
#[derive(Debug)]
pub enum WorkspaceError {
    /// The collection is empty; the operation needs an active note.
    NoActiveNote,
    /// An index points outside the loaded collection.
    IndexOutOfRange { index: usize, len: usize },
    /// The requested note is not in the loaded collection.
    NoteNotLoaded(NoteId),
    /// The active note's scheduler is gone (driver task ended).
    EditorClosed(NoteId),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveNote => write!(f, "no active note"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "note index {index} out of range for {len} notes")
            }
            Self::NoteNotLoaded(id) => write!(f, "note {id} is not loaded"),
            Self::EditorClosed(id) => write!(f, "autosave editor closed for note {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for WorkspaceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// One signed-in user's loaded notes plus editing machinery.
pub struct NoteWorkspace {
    store: Arc<dyn NoteStore>,
    config: WorkspaceConfig,
    user_id: UserId,
    notes: Vec<Note>,
    active: usize,
    editor: Option<AutosaveHandle>,
    /// Tags as last drafted for the active note. The canonical record lags
    /// behind by up to one flush; tag operations must read their own
    /// writes to accumulate within a window.
    draft_tags: Option<Vec<String>>,
    events_tx: mpsc::UnboundedSender<AutosaveEvent>,
    events_rx: mpsc::UnboundedReceiver<AutosaveEvent>,
}

impl NoteWorkspace {
    /// Loads the user's notes and opens a workspace over them. The first
    /// note (most recently updated) starts active.
    pub async fn open(
        store: Arc<dyn NoteStore>,
        user_id: UserId,
        config: WorkspaceConfig,
    ) -> WorkspaceResult<Self> {
        let notes = store.list_notes(user_id).await?;
        info!(
            "event=workspace_open module=workspace status=ok user_id={user_id} notes={}",
            notes.len()
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            store,
            config,
            user_id,
            notes,
            active: 0,
            editor: None,
            draft_tags: None,
            events_tx,
            events_rx,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Loaded notes in their current display order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Active index. Meaningful only while the collection is non-empty.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Active note's canonical record, when any notes exist.
    pub fn active_note(&self) -> Option<&Note> {
        self.notes.get(self.active)
    }

    /// Scheduler state for the active note.
    pub fn save_status(&self) -> SaveStatus {
        self.editor
            .as_ref()
            .map(|editor| editor.status())
            .unwrap_or(SaveStatus::Idle)
    }

    /// Makes the note at `index` active. Pending edits on the outgoing
    /// note are flushed first.
    pub async fn select(&mut self, index: usize) -> WorkspaceResult<()> {
        if index >= self.notes.len() {
            return Err(WorkspaceError::IndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }
        if index != self.active {
            self.close_editor(true).await;
            self.active = index;
        }
        Ok(())
    }

    /// Makes the note with `note_id` active, when it is loaded.
    pub async fn select_by_id(&mut self, note_id: NoteId) -> WorkspaceResult<()> {
        match self.notes.iter().position(|note| note.id == note_id) {
            Some(index) => self.select(index).await,
            None => Err(WorkspaceError::NoteNotLoaded(note_id)),
        }
    }

    /// Moves selection one note down the list, stopping at the end.
    pub async fn select_next(&mut self) -> WorkspaceResult<()> {
        if self.notes.is_empty() {
            return Err(WorkspaceError::NoActiveNote);
        }
        let next = (self.active + 1).min(self.notes.len() - 1);
        self.select(next).await
    }

    /// Moves selection one note up the list, stopping at the start.
    pub async fn select_previous(&mut self) -> WorkspaceResult<()> {
        if self.notes.is_empty() {
            return Err(WorkspaceError::NoActiveNote);
        }
        self.select(self.active.saturating_sub(1)).await
    }

    /// Creates a seeded note, prepends it, and makes it active. Pending
    /// edits on the previously active note are flushed first.
    pub async fn create_note(&mut self) -> WorkspaceResult<NoteId> {
        self.close_editor(true).await;
        let note = self
            .store
            .create_note(self.user_id, NewNote::placeholder())
            .await?;
        let note_id = note.id;
        self.notes.insert(0, note);
        self.active = 0;
        info!("event=note_create module=workspace status=ok note_id={note_id}");
        Ok(note_id)
    }

    /// Deletes the note at `index`. A record already gone from the store is
    /// treated as deleted. The active index is clamped back into range.
    pub async fn delete_note_at(&mut self, index: usize) -> WorkspaceResult<NoteId> {
        if index >= self.notes.len() {
            return Err(WorkspaceError::IndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }
        let note_id = self.notes[index].id;

        if index == self.active {
            // Edits for a note being deleted are moot; discard explicitly.
            self.close_editor(false).await;
        }

        match self.store.delete_note(note_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!("event=note_delete module=workspace status=gone note_id={note_id}");
            }
            Err(err) => return Err(err.into()),
        }

        self.notes.remove(index);
        self.active = clamped_index_after_removal(self.active, index, self.notes.len());
        info!(
            "event=note_delete module=workspace status=ok note_id={note_id} remaining={}",
            self.notes.len()
        );
        Ok(note_id)
    }

    /// Deletes the active note, discarding its pending edits.
    pub async fn delete_active(&mut self) -> WorkspaceResult<NoteId> {
        if self.notes.is_empty() {
            return Err(WorkspaceError::NoActiveNote);
        }
        self.delete_note_at(self.active).await
    }

    /// Records one field edit for the active note and (re)arms autosave.
    /// Content edits crossing a length milestone also refresh the
    /// suggestion bundle when auto-suggest is on.
    pub fn edit(&mut self, edit: NoteEdit) -> WorkspaceResult<()> {
        let note_id = match self.active_note() {
            Some(note) => note.id,
            None => return Err(WorkspaceError::NoActiveNote),
        };

        if self.config.auto_suggest {
            if let NoteEdit::Content(content) = &edit {
                if assistant::at_refresh_milestone(content) {
                    let bundle = {
                        let existing = &self.notes[self.active].tags;
                        assistant::suggest(content, existing)
                    };
                    if let Some(bundle) = bundle {
                        self.send_edit(note_id, NoteEdit::Suggestions(bundle))?;
                    }
                }
            }
        }

        self.send_edit(note_id, edit)
    }

    /// Title edit for the active note.
    pub fn edit_title(&mut self, title: impl Into<String>) -> WorkspaceResult<()> {
        self.edit(NoteEdit::Title(title.into()))
    }

    /// Subtitle edit for the active note.
    pub fn edit_subtitle(&mut self, subtitle: impl Into<String>) -> WorkspaceResult<()> {
        self.edit(NoteEdit::Subtitle(subtitle.into()))
    }

    /// Content edit for the active note.
    pub fn edit_content(&mut self, content: impl Into<String>) -> WorkspaceResult<()> {
        self.edit(NoteEdit::Content(content.into()))
    }

    /// Whole-set tags replacement for the active note.
    pub fn set_tags(&mut self, tags: Vec<String>) -> WorkspaceResult<()> {
        let normalized = normalize_tags(&tags);
        self.edit(NoteEdit::Tags(normalized.clone()))?;
        self.draft_tags = Some(normalized);
        Ok(())
    }

    /// Tags as currently drafted for the active note: the pending edit when
    /// one exists, the canonical record otherwise.
    pub fn active_tags(&self) -> Option<Vec<String>> {
        let note = self.active_note()?;
        Some(match &self.draft_tags {
            Some(tags) => tags.clone(),
            None => note.tags.clone(),
        })
    }

    /// Appends one tag. Returns false without recording anything when the
    /// trimmed value is blank or already present.
    pub fn add_tag(&mut self, tag: &str) -> WorkspaceResult<bool> {
        let mut tags = self.active_tags().ok_or(WorkspaceError::NoActiveNote)?;
        let Some(value) = normalize_tag(tag) else {
            return Ok(false);
        };
        if tags.contains(&value) {
            return Ok(false);
        }
        tags.push(value);
        self.set_tags(tags)?;
        Ok(true)
    }

    /// Rewrites the tag at `tag_index`; a blank value deletes it.
    pub fn update_tag(&mut self, tag_index: usize, value: &str) -> WorkspaceResult<()> {
        let mut tags = self.active_tags().ok_or(WorkspaceError::NoActiveNote)?;
        if tag_index >= tags.len() {
            return Err(WorkspaceError::IndexOutOfRange {
                index: tag_index,
                len: tags.len(),
            });
        }
        match normalize_tag(value) {
            Some(new_value) => tags[tag_index] = new_value,
            None => {
                tags.remove(tag_index);
            }
        }
        self.set_tags(tags)
    }

    /// Removes the first exact occurrence of `tag`. Returns whether
    /// anything was removed.
    pub fn remove_tag(&mut self, tag: &str) -> WorkspaceResult<bool> {
        let mut tags = self.active_tags().ok_or(WorkspaceError::NoActiveNote)?;
        match tags.iter().position(|existing| existing == tag) {
            Some(position) => {
                tags.remove(position);
                self.set_tags(tags)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Derives a title from the active note's content and applies it to the
    /// title field. Returns the applied value, or `None` when the content
    /// offers nothing.
    pub fn apply_suggested_title(&mut self) -> WorkspaceResult<Option<String>> {
        let content = self
            .active_note()
            .ok_or(WorkspaceError::NoActiveNote)?
            .content
            .clone();
        match assistant::suggest_title(&content) {
            Some(title) => {
                self.edit_title(title.clone())?;
                Ok(Some(title))
            }
            None => Ok(None),
        }
    }

    /// Derives a summary from the active note's content and applies it to
    /// the subtitle field.
    pub fn apply_suggested_summary(&mut self) -> WorkspaceResult<Option<String>> {
        let content = self
            .active_note()
            .ok_or(WorkspaceError::NoActiveNote)?
            .content
            .clone();
        match assistant::suggest_summary(&content) {
            Some(summary) => {
                self.edit_subtitle(summary.clone())?;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }

    /// Appends suggested tags derived from the active note's content.
    /// Returns the applied suggestions, possibly empty.
    pub fn apply_suggested_tags(&mut self) -> WorkspaceResult<Vec<String>> {
        let content = self
            .active_note()
            .ok_or(WorkspaceError::NoActiveNote)?
            .content
            .clone();
        let current = self.active_tags().ok_or(WorkspaceError::NoActiveNote)?;
        let suggested = assistant::suggest_tags(&content, &current);
        if suggested.is_empty() {
            return Ok(suggested);
        }

        let mut tags = current;
        tags.extend(suggested.iter().cloned());
        self.set_tags(tags)?;
        Ok(suggested)
    }

    /// Filters the loaded notes for `query`: case-insensitive substring
    /// over title, content, and tags. The empty query returns everything.
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let filter = NoteFilter::new(query);
        filter.filter(&self.notes).collect()
    }

    /// Unique non-empty tags across the collection, in first-seen order.
    pub fn known_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for note in &self.notes {
            for tag in &note.tags {
                if tag.is_empty() {
                    continue;
                }
                if seen.insert(tag.clone()) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }

    /// Requests an immediate flush of the active note's pending edits,
    /// resetting the retry budget.
    pub fn retry_save(&mut self) -> WorkspaceResult<()> {
        let note_id = match self.active_note() {
            Some(note) => note.id,
            None => return Err(WorkspaceError::NoActiveNote),
        };
        match &self.editor {
            Some(editor) if editor.note_id() == note_id => {
                if editor.retry() {
                    Ok(())
                } else {
                    Err(WorkspaceError::EditorClosed(note_id))
                }
            }
            _ => Ok(()),
        }
    }

    /// Drains and applies every queued scheduler event. Returns how many
    /// were applied.
    pub fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(&event);
            applied += 1;
        }
        applied
    }

    /// Waits for the next scheduler event, applies it, and hands it back.
    pub async fn next_event(&mut self) -> Option<AutosaveEvent> {
        let event = self.events_rx.recv().await?;
        self.apply_event(&event);
        Some(event)
    }

    /// Flushes the active editor (when asked to) and shuts the workspace
    /// down. `flush` false is the sign-out path: pending edits are
    /// discarded with a warning.
    pub async fn close(mut self, flush: bool) {
        self.close_editor(flush).await;
        self.pump_events();
        info!(
            "event=workspace_close module=workspace status=ok user_id={}",
            self.user_id
        );
    }

    fn send_edit(&mut self, note_id: NoteId, edit: NoteEdit) -> WorkspaceResult<()> {
        let stale = self
            .editor
            .as_ref()
            .map_or(true, |editor| editor.note_id() != note_id);
        if stale {
            self.editor = Some(AutosaveHandle::spawn(
                note_id,
                Arc::clone(&self.store),
                self.config.autosave.clone(),
                self.events_tx.clone(),
            ));
        }
        let delivered = self
            .editor
            .as_ref()
            .map_or(false, |editor| editor.edit(edit));
        if delivered {
            Ok(())
        } else {
            Err(WorkspaceError::EditorClosed(note_id))
        }
    }

    async fn close_editor(&mut self, flush: bool) {
        if let Some(editor) = self.editor.take() {
            editor.close(flush).await;
        }
        self.draft_tags = None;
    }

    fn apply_event(&mut self, event: &AutosaveEvent) {
        match event {
            AutosaveEvent::Saved { note } => {
                match self.notes.iter().position(|existing| existing.id == note.id) {
                    Some(position) => self.notes[position] = note.clone(),
                    None => {
                        // Save completed after the note left the collection.
                        warn!(
                            "event=autosave_apply module=workspace status=dropped note_id={}",
                            note.id
                        );
                    }
                }
            }
            AutosaveEvent::NoteMissing { note_id } => {
                let was_editor_target = self
                    .editor
                    .as_ref()
                    .map_or(false, |editor| editor.note_id() == *note_id);
                if was_editor_target {
                    self.editor = None;
                    self.draft_tags = None;
                }
                if let Some(position) =
                    self.notes.iter().position(|existing| existing.id == *note_id)
                {
                    self.notes.remove(position);
                    self.active =
                        clamped_index_after_removal(self.active, position, self.notes.len());
                }
                warn!("event=autosave_apply module=workspace status=missing note_id={note_id}");
            }
            AutosaveEvent::SaveFailed {
                note_id,
                attempts,
                message,
            } => {
                warn!(
                    "event=autosave_apply module=workspace status=save_failed note_id={note_id} attempts={attempts} error={message}"
                );
            }
        }
    }
}

/// Where the active index lands after removing the note at `removed`.
/// Earlier removals shift the index down with the note it points at; the
/// index is otherwise clamped to the new tail.
fn clamped_index_after_removal(active: usize, removed: usize, remaining: usize) -> usize {
    if remaining == 0 {
        return 0;
    }
    if removed < active {
        active - 1
    } else if active >= remaining {
        remaining - 1
    } else {
        active
    }
}
