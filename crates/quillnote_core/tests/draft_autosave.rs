use quillnote_core::{
    AutosaveConfig, AutosaveEvent, AutosaveHandle, MemoryNoteStore, NewNote, Note, NoteEdit,
    NoteStore, SaveStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

fn config(quiescence_ms: u64) -> AutosaveConfig {
    AutosaveConfig {
        quiescence: Duration::from_millis(quiescence_ms),
        ..AutosaveConfig::default()
    }
}

async fn seeded_store() -> (Arc<MemoryNoteStore>, Note) {
    let store = Arc::new(MemoryNoteStore::new());
    let note = store
        .create_note(Uuid::new_v4(), NewNote::placeholder())
        .await
        .unwrap();
    (store, note)
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_update_with_last_write_wins() {
    let (store, note) = seeded_store().await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(1000),
        events_tx,
    );

    handle.edit(NoteEdit::Title("first dra".to_string()));
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.edit(NoteEdit::Title("First draft".to_string()));
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.edit(NoteEdit::Content("Body".to_string()));

    // The window closes only after the last edit goes quiet.
    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "First draft");
    assert_eq!(saved.content, "Body");

    let updates = store.completed_updates().await;
    assert_eq!(updates.len(), 1, "edits inside one window must coalesce");
    let (updated_id, changes) = &updates[0];
    assert_eq!(*updated_id, note.id);
    assert_eq!(changes.title.as_deref(), Some("First draft"));
    assert_eq!(changes.content.as_deref(), Some("Body"));
    assert!(changes.subtitle.is_none());

    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn separate_quiet_windows_produce_separate_updates() {
    let (store, note) = seeded_store().await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("One".to_string()));
    assert!(matches!(
        events_rx.recv().await.unwrap(),
        AutosaveEvent::Saved { .. }
    ));

    handle.edit(NoteEdit::Title("Two".to_string()));
    assert!(matches!(
        events_rx.recv().await.unwrap(),
        AutosaveEvent::Saved { .. }
    ));

    assert_eq!(store.completed_updates().await.len(), 2);
    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn updates_for_one_note_never_overlap() {
    let (store, note) = seeded_store().await;
    store
        .set_update_latency(Some(Duration::from_millis(500)))
        .await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("A".to_string()));
    // While the first flush is in flight, queue more edits; they must wait
    // for the first result before forming the next flush.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.edit(NoteEdit::Title("B".to_string()));
    handle.edit(NoteEdit::Subtitle("S".to_string()));

    let AutosaveEvent::Saved { note: first } = events_rx.recv().await.unwrap() else {
        panic!("expected first Saved");
    };
    let AutosaveEvent::Saved { note: second } = events_rx.recv().await.unwrap() else {
        panic!("expected second Saved");
    };
    assert_eq!(first.title, "A");
    assert_eq!(second.title, "B");
    assert_eq!(second.subtitle, "S");
    assert!(second.updated_at > first.updated_at);

    let updates = store.completed_updates().await;
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].1.title.as_deref(), Some("A"));
    assert_eq!(updates[1].1.title.as_deref(), Some("B"));
    assert_eq!(updates[1].1.subtitle.as_deref(), Some("S"));

    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn failed_flush_retains_fields_and_retries() {
    let (store, note) = seeded_store().await;
    store.fail_next_updates(1);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("Kept".to_string()));

    let AutosaveEvent::SaveFailed { attempts, .. } = events_rx.recv().await.unwrap() else {
        panic!("expected SaveFailed");
    };
    assert_eq!(attempts, 1);
    assert!(matches!(
        handle.status(),
        SaveStatus::SaveFailed { attempts: 1, .. }
    ));

    // The retry runs on the next quiescence window without new input.
    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "Kept");
    assert_eq!(store.completed_updates().await.len(), 1);

    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn edits_after_a_failure_win_over_restored_fields() {
    let (store, note) = seeded_store().await;
    store
        .set_update_latency(Some(Duration::from_millis(300)))
        .await;
    store.fail_next_updates(1);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("Old".to_string()));
    handle.edit(NoteEdit::Content("Body".to_string()));
    // Queue a newer title while the failing flush is in flight.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.edit(NoteEdit::Title("New".to_string()));

    assert!(matches!(
        events_rx.recv().await.unwrap(),
        AutosaveEvent::SaveFailed { .. }
    ));
    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "New", "newer edit outranks the restored field");
    assert_eq!(saved.content, "Body", "failed field is retained");

    assert_eq!(store.completed_updates().await.len(), 1);
    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn vanished_note_resolves_to_a_benign_drop() {
    let (store, note) = seeded_store().await;
    store.delete_note(note.id).await.unwrap();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("Ghost".to_string()));
    let AutosaveEvent::NoteMissing { note_id } = events_rx.recv().await.unwrap() else {
        panic!("expected NoteMissing");
    };
    assert_eq!(note_id, note.id);
    assert_eq!(handle.status(), SaveStatus::Idle);
    assert!(store.completed_updates().await.is_empty());

    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn close_with_flush_submits_pending_edits_immediately() {
    let (store, note) = seeded_store().await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    // A window far longer than the test: only the close can trigger the
    // flush.
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(60_000),
        events_tx,
    );

    handle.edit(NoteEdit::Title("Leaving".to_string()));
    handle.close(true).await;

    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "Leaving");
    assert_eq!(store.completed_updates().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_without_flush_discards_pending_edits() {
    let (store, note) = seeded_store().await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );

    handle.edit(NoteEdit::Title("Discarded".to_string()));
    handle.close(false).await;

    assert!(store.completed_updates().await.is_empty());
    assert!(events_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_holds_fields_until_explicit_retry() {
    let (store, note) = seeded_store().await;
    store.fail_next_updates(4);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        AutosaveConfig {
            quiescence: Duration::from_millis(100),
            max_retry_attempts: 3,
        },
        events_tx,
    );

    handle.edit(NoteEdit::Title("Stubborn".to_string()));
    for expected in 1..=3u32 {
        let AutosaveEvent::SaveFailed { attempts, .. } = events_rx.recv().await.unwrap() else {
            panic!("expected SaveFailed");
        };
        assert_eq!(attempts, expected);
    }

    // Budget spent: no further automatic attempts.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(events_rx.try_recv().is_err());
    assert!(matches!(
        handle.status(),
        SaveStatus::SaveFailed { attempts: 3, .. }
    ));

    // Explicit retry resets the counter; the last injected failure burns,
    // then the flush lands.
    handle.retry();
    let AutosaveEvent::SaveFailed { attempts, .. } = events_rx.recv().await.unwrap() else {
        panic!("expected SaveFailed");
    };
    assert_eq!(attempts, 1, "explicit retry resets the attempt counter");
    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "Stubborn");
}

#[tokio::test(start_paused = true)]
async fn a_new_edit_resets_the_exhausted_retry_budget() {
    let (store, note) = seeded_store().await;
    store.fail_next_updates(1);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        AutosaveConfig {
            quiescence: Duration::from_millis(100),
            max_retry_attempts: 1,
        },
        events_tx,
    );

    handle.edit(NoteEdit::Title("Halted".to_string()));
    assert!(matches!(
        events_rx.recv().await.unwrap(),
        AutosaveEvent::SaveFailed { attempts: 1, .. }
    ));

    // Held: one failure spent the whole budget.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(events_rx.try_recv().is_err());

    handle.edit(NoteEdit::Content("typing resumes".to_string()));
    let AutosaveEvent::Saved { note: saved } = events_rx.recv().await.unwrap() else {
        panic!("expected Saved");
    };
    assert_eq!(saved.title, "Halted");
    assert_eq!(saved.content, "typing resumes");

    handle.close(false).await;
}

#[tokio::test(start_paused = true)]
async fn status_walks_idle_pending_saving_idle() {
    let (store, note) = seeded_store().await;
    store
        .set_update_latency(Some(Duration::from_millis(200)))
        .await;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = AutosaveHandle::spawn(
        note.id,
        store.clone() as Arc<dyn NoteStore>,
        config(100),
        events_tx,
    );
    let mut status = handle.status_watch();

    assert_eq!(*status.borrow(), SaveStatus::Idle);

    handle.edit(NoteEdit::Title("Walk".to_string()));
    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SaveStatus::PendingEdits);

    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SaveStatus::Saving);

    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SaveStatus::Idle);

    assert!(matches!(
        events_rx.recv().await.unwrap(),
        AutosaveEvent::Saved { .. }
    ));
    handle.close(false).await;
}
