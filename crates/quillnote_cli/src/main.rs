//! Demo driver for the quillnote core.
//!
//! Walks the full editing surface end to end: sign-in, create, an edit
//! burst, the debounced flush, search, and suggestion application. Output
//! is deterministic enough for a quick local sanity check.

use quillnote_core::{
    default_log_level, init_logging, AutosaveConfig, AutosaveEvent, MemoryNoteStore, NoteStore,
    NoteWorkspace, SessionContext, SqliteNoteStore, UserProfile, WorkspaceConfig,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("quillnote demo failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = std::env::temp_dir().join("quillnote-logs");
    // Why: the demo stays usable even when another process already
    // initialized logging differently.
    let _ = init_logging(default_log_level(), &log_dir.to_string_lossy());

    // A database path argument switches the backend; default is in-memory.
    let store: Arc<dyn NoteStore> = match std::env::args().nth(1) {
        Some(path) => Arc::new(SqliteNoteStore::open(path)?),
        None => Arc::new(MemoryNoteStore::new()),
    };

    let session = SessionContext::new();
    session.sign_in(UserProfile::new("demo@quillnote.dev").with_display_name("Demo"));
    let user = session.current().ok_or("no signed-in user")?;
    println!("signed in as {}", user.email);

    let config = WorkspaceConfig {
        autosave: AutosaveConfig {
            quiescence: Duration::from_millis(200),
            ..AutosaveConfig::default()
        },
        ..WorkspaceConfig::default()
    };
    let mut workspace = NoteWorkspace::open(store, user.id, config).await?;

    workspace.create_note().await?;
    println!("created a note, {} in the list", workspace.notes().len());

    workspace.edit_title("Quarterly planning")?;
    workspace.edit_content(
        "Quarterly planning starts with honest capacity numbers. \
         Workstreams compete for attention. Prioritize ruthlessly.",
    )?;
    workspace.add_tag("planning")?;

    if let Some(AutosaveEvent::Saved { note }) = workspace.next_event().await {
        println!(
            "autosaved `{}` tags=[{}] updated_at={}",
            note.title,
            note.tags.join(", "),
            note.updated_at
        );
    }

    let matches = workspace.search("capacity");
    println!("search `capacity` found {} note(s)", matches.len());

    if let Some(summary) = workspace.apply_suggested_summary()? {
        println!("suggested summary: {summary}");
    }
    if let Some(AutosaveEvent::Saved { note }) = workspace.next_event().await {
        println!("autosaved subtitle `{}`", note.subtitle);
    }

    for note in workspace.search("") {
        println!("- {} [{}]", note.title, note.tags.join(", "));
    }

    workspace.close(true).await;
    session.sign_out();
    println!("signed out");
    Ok(())
}
