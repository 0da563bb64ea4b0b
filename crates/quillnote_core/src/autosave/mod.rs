//! Debounced autosave scheduler.
//!
//! # Responsibility
//! - Coalesce rapid field edits into one partial update per quiescent
//!   window.
//! - Submit updates for one note strictly in order: the next flush is not
//!   issued until the previous result has been observed.
//! - Retain failed flushes for retry and surface the failure state.
//!
//! # Invariants
//! - At most one quiescence window is live per buffer; every edit re-arms
//!   its deadline.
//! - At most one store call is in flight per handle.
//! - Pending edits are never dropped silently; every discard path logs the
//!   affected fields.
//!
//! The driver is a command channel plus a timer loop: wait for the first
//! edit, keep consuming edits until the window stays quiet, then await the
//! store call before looking at the channel again. Ordering falls out of
//! the loop shape instead of a lock.

use crate::draft::DraftBuffer;
use crate::model::note::{Note, NoteEdit, NoteId};
use crate::store::{NoteStore, StoreError};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a flush is submitted.
    pub quiescence: Duration,
    /// Automatic retries after a failed flush before the scheduler holds
    /// the pending fields and waits for a new edit or an explicit retry.
    pub max_retry_attempts: u32,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            quiescence: Duration::from_millis(1000),
            max_retry_attempts: 3,
        }
    }
}

/// Observable scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// No pending edits and no call in flight.
    Idle,
    /// Edits are buffered; the quiescence window is armed.
    PendingEdits,
    /// A flush is in flight.
    Saving,
    /// The last flush failed; its fields are retained for retry.
    SaveFailed { attempts: u32, message: String },
}

/// Scheduler outcome delivered to the owning workspace.
#[derive(Debug, Clone)]
pub enum AutosaveEvent {
    /// A flush succeeded; `note` is the store's canonical record.
    Saved { note: Note },
    /// A flush failed; the fields stay buffered for retry.
    SaveFailed {
        note_id: NoteId,
        attempts: u32,
        message: String,
    },
    /// The store reports the note gone; the buffered fields were dropped
    /// as a benign no-op.
    NoteMissing { note_id: NoteId },
}

enum EditorCommand {
    Edit(NoteEdit),
    Retry,
    Close { flush: bool, done: oneshot::Sender<()> },
}

/// Handle to one note's scheduler.
///
/// Dropping the handle without `close` is abrupt teardown: the window is
/// cancelled and pending fields are discarded with a warning.
pub struct AutosaveHandle {
    note_id: NoteId,
    commands: mpsc::UnboundedSender<EditorCommand>,
    status: watch::Receiver<SaveStatus>,
}

impl AutosaveHandle {
    /// Spawns the driver task for one note.
    pub fn spawn(
        note_id: NoteId,
        store: Arc<dyn NoteStore>,
        config: AutosaveConfig,
        events: mpsc::UnboundedSender<AutosaveEvent>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SaveStatus::Idle);
        let driver = Driver {
            store,
            config,
            buffer: DraftBuffer::new(note_id),
            attempts: 0,
            status: status_tx,
            events,
        };
        tokio::spawn(driver.run(commands_rx));
        Self {
            note_id,
            commands: commands_tx,
            status: status_rx,
        }
    }

    /// Note this scheduler writes to.
    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    /// Records one field edit and re-arms the quiescence window. Returns
    /// false when the driver is gone.
    pub fn edit(&self, edit: NoteEdit) -> bool {
        self.commands.send(EditorCommand::Edit(edit)).is_ok()
    }

    /// Requests an immediate flush of whatever is pending, resetting the
    /// retry budget. Returns false when the driver is gone.
    pub fn retry(&self) -> bool {
        self.commands.send(EditorCommand::Retry).is_ok()
    }

    /// Current scheduler state.
    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    /// Watch side of the scheduler state, for await-style observers.
    pub fn status_watch(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Stops the driver. With `flush` set, pending edits are submitted once
    /// before shutdown (clean navigation); otherwise they are discarded
    /// with a warning (deletion, sign-out).
    pub async fn close(self, flush: bool) {
        let (done_tx, done_rx) = oneshot::channel();
        let command = EditorCommand::Close {
            flush,
            done: done_tx,
        };
        if self.commands.send(command).is_ok() {
            let _ = done_rx.await;
        }
    }
}

struct Driver {
    store: Arc<dyn NoteStore>,
    config: AutosaveConfig,
    buffer: DraftBuffer,
    attempts: u32,
    status: watch::Sender<SaveStatus>,
    events: mpsc::UnboundedSender<AutosaveEvent>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EditorCommand>) {
        loop {
            if self.buffer.is_empty() {
                // Idle: nothing buffered, nothing to time.
                match commands.recv().await {
                    Some(EditorCommand::Edit(edit)) => self.record(edit),
                    Some(EditorCommand::Retry) => {}
                    Some(EditorCommand::Close { done, .. }) => {
                        let _ = done.send(());
                        return;
                    }
                    None => return,
                }
            } else if self.attempts > 0 && self.attempts >= self.config.max_retry_attempts {
                // Retry budget spent: hold the fields until new input.
                match commands.recv().await {
                    Some(EditorCommand::Edit(edit)) => {
                        self.attempts = 0;
                        self.record(edit);
                    }
                    Some(EditorCommand::Retry) => {
                        self.attempts = 0;
                        self.flush().await;
                    }
                    Some(EditorCommand::Close { flush, done }) => {
                        self.close_out(flush).await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        self.discard_on_drop();
                        return;
                    }
                }
            } else {
                // Edits pending: run one quiescence window, re-armed per
                // edit, then flush.
                let mut deadline = Instant::now() + self.config.quiescence;
                loop {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(EditorCommand::Edit(edit)) => {
                                self.record(edit);
                                deadline = Instant::now() + self.config.quiescence;
                            }
                            Some(EditorCommand::Retry) => {
                                self.attempts = 0;
                                break;
                            }
                            Some(EditorCommand::Close { flush, done }) => {
                                self.close_out(flush).await;
                                let _ = done.send(());
                                return;
                            }
                            None => {
                                self.discard_on_drop();
                                return;
                            }
                        },
                        _ = tokio::time::sleep_until(deadline) => break,
                    }
                }
                self.flush().await;
            }
        }
    }

    fn record(&mut self, edit: NoteEdit) {
        self.buffer.record(edit);
        self.set_status(SaveStatus::PendingEdits);
    }

    async fn flush(&mut self) {
        let note_id = self.buffer.note_id();
        let Some(changes) = self.buffer.take() else {
            return;
        };
        let fields = changes.field_names().join(",");

        self.set_status(SaveStatus::Saving);
        info!("event=autosave_flush module=autosave status=start note_id={note_id} fields={fields}");

        match self.store.update_note(note_id, changes.clone()).await {
            Ok(note) => {
                self.attempts = 0;
                self.set_status(SaveStatus::Idle);
                info!(
                    "event=autosave_flush module=autosave status=ok note_id={note_id} fields={fields} updated_at={}",
                    note.updated_at
                );
                let _ = self.events.send(AutosaveEvent::Saved { note });
            }
            Err(StoreError::NotFound(_)) => {
                // The note vanished under us. Dropping the fields is the
                // contract; the workspace prunes its copy on this event.
                self.attempts = 0;
                self.set_status(SaveStatus::Idle);
                warn!("event=autosave_flush module=autosave status=gone note_id={note_id} fields={fields}");
                let _ = self.events.send(AutosaveEvent::NoteMissing { note_id });
            }
            Err(err) => {
                self.attempts += 1;
                let message = err.to_string();
                self.buffer.restore(changes);
                self.set_status(SaveStatus::SaveFailed {
                    attempts: self.attempts,
                    message: message.clone(),
                });
                warn!(
                    "event=autosave_flush module=autosave status=error note_id={note_id} fields={fields} attempts={} error={message}",
                    self.attempts
                );
                let _ = self.events.send(AutosaveEvent::SaveFailed {
                    note_id,
                    attempts: self.attempts,
                    message,
                });
            }
        }
    }

    async fn close_out(&mut self, flush: bool) {
        if self.buffer.is_empty() {
            return;
        }
        if flush {
            // One submission on the way out; shutdown does not retry-loop.
            self.flush().await;
            if !self.buffer.is_empty() {
                self.log_discard("close_after_failed_flush");
            }
        } else {
            self.log_discard("close_without_flush");
        }
    }

    fn discard_on_drop(&self) {
        if !self.buffer.is_empty() {
            self.log_discard("handle_dropped");
        }
    }

    fn log_discard(&self, reason: &str) {
        warn!(
            "event=autosave_discard module=autosave status=warn note_id={} fields={} reason={reason}",
            self.buffer.note_id(),
            self.buffer.pending().field_names().join(",")
        );
    }

    fn set_status(&self, status: SaveStatus) {
        self.status.send_replace(status);
    }
}
