//! SQLite-backed note store.
//!
//! # Responsibility
//! - Persist note records in a local SQLite database (file or in-memory).
//! - Apply schema migrations before the first query.
//! - Map backend failures into the shared store taxonomy.
//!
//! # Invariants
//! - The schema version is tracked via `PRAGMA user_version`; a database
//!   newer than this build is rejected instead of guessed at.
//! - `updated_at` values are strictly monotonic per store instance.
//! - Tag and suggested-tag arrays round-trip losslessly (JSON text columns).
//! - The suggestion columns are all set or all null; anything else is
//!   rejected as invalid persisted data.

use crate::model::note::{
    normalize_tags, NewNote, Note, NoteChangeset, NoteId, Suggestions, UserId,
};
use crate::store::{MonotonicClock, NoteStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    subtitle,
    content,
    tags,
    ai_title,
    ai_summary,
    ai_suggested_tags,
    created_at,
    updated_at
FROM notes";

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE notes (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        subtitle TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL,
        ai_title TEXT,
        ai_summary TEXT,
        ai_suggested_tags TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX idx_notes_owner_recency ON notes (user_id, updated_at DESC);",
}];

fn latest_schema_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Backend-reported failures are treated as transient. Shape violations in
/// persisted data are raised explicitly by the row parser instead.
impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// SQLite store. The connection is shared behind a mutex; every call locks,
/// runs its statements without awaiting, and unlocks.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
    clock: MonotonicClock,
}

impl SqliteNoteStore {
    /// Opens (or creates) a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=store backend=sqlite status=start mode=file");
        match Connection::open(path) {
            Ok(conn) => Self::bootstrap(conn, "file", started_at),
            Err(err) => {
                error!(
                    "event=store_open module=store backend=sqlite status=error mode=file duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    /// Opens a fresh in-memory database and applies the migrations.
    pub fn open_in_memory() -> StoreResult<Self> {
        let started_at = Instant::now();
        info!("event=store_open module=store backend=sqlite status=start mode=memory");
        match Connection::open_in_memory() {
            Ok(conn) => Self::bootstrap(conn, "memory", started_at),
            Err(err) => {
                error!(
                    "event=store_open module=store backend=sqlite status=error mode=memory duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
        }
    }

    fn bootstrap(mut conn: Connection, mode: &str, started_at: Instant) -> StoreResult<Self> {
        match configure(&mut conn) {
            Ok(()) => {
                info!(
                    "event=store_open module=store backend=sqlite status=ok mode={mode} schema_version={} duration_ms={}",
                    latest_schema_version(),
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    conn: Mutex::new(conn),
                    clock: MonotonicClock::default(),
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store backend=sqlite status=error mode={mode} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn configure(conn: &mut Connection) -> StoreResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}

fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_schema_version();

    if current > latest {
        return Err(StoreError::InvalidRecord(format!(
            "database schema version {current} is newer than supported version {latest}"
        )));
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
    }
    tx.commit()?;
    info!(
        "event=store_migrate module=store backend=sqlite status=ok from={current} to={latest}"
    );
    Ok(())
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn list_notes(&self, user_id: UserId) -> StoreResult<Vec<Note>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE user_id = ?
             ORDER BY updated_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
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
        let tags_json = encode_string_array(&note.tags)?;

        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO notes (
                id, user_id, title, subtitle, content, tags,
                ai_title, ai_summary, ai_suggested_tags,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL, ?7, ?8);",
            params![
                note.id.to_string(),
                user_id.to_string(),
                note.title,
                note.subtitle,
                note.content,
                tags_json,
                note.created_at,
                note.updated_at,
            ],
        )?;

        info!(
            "event=note_create module=store backend=sqlite status=ok note_id={}",
            note.id
        );
        Ok(note)
    }

    async fn update_note(&self, note_id: NoteId, changes: NoteChangeset) -> StoreResult<Note> {
        if changes.is_empty() {
            let conn = self.lock_conn();
            return get_note(&conn, note_id)?.ok_or(StoreError::NotFound(note_id));
        }

        let stamp = self.clock.next();
        let mut sql = String::from("UPDATE notes SET updated_at = ?");
        let mut bind_values: Vec<Value> = vec![Value::Integer(stamp)];

        if let Some(title) = &changes.title {
            sql.push_str(", title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(subtitle) = &changes.subtitle {
            sql.push_str(", subtitle = ?");
            bind_values.push(Value::Text(subtitle.clone()));
        }
        if let Some(content) = &changes.content {
            sql.push_str(", content = ?");
            bind_values.push(Value::Text(content.clone()));
        }
        if let Some(tags) = &changes.tags {
            sql.push_str(", tags = ?");
            bind_values.push(Value::Text(encode_string_array(tags)?));
        }
        if let Some(bundle) = &changes.suggestions {
            sql.push_str(", ai_title = ?, ai_summary = ?, ai_suggested_tags = ?");
            bind_values.push(Value::Text(bundle.title.clone()));
            bind_values.push(Value::Text(bundle.summary.clone()));
            bind_values.push(Value::Text(encode_string_array(&bundle.suggested_tags)?));
        }
        sql.push_str(" WHERE id = ?;");
        bind_values.push(Value::Text(note_id.to_string()));

        let conn = self.lock_conn();
        let changed = conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(StoreError::NotFound(note_id));
        }

        let canonical = get_note(&conn, note_id)?.ok_or_else(|| {
            StoreError::InvalidRecord(format!("note {note_id} missing on read-back after update"))
        })?;
        info!(
            "event=note_update module=store backend=sqlite status=ok note_id={note_id} fields={}",
            changes.field_names().join(",")
        );
        Ok(canonical)
    }

    async fn delete_note(&self, note_id: NoteId) -> StoreResult<()> {
        let conn = self.lock_conn();
        let changed = conn.execute("DELETE FROM notes WHERE id = ?;", [note_id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(note_id));
        }
        info!("event=note_delete module=store backend=sqlite status=ok note_id={note_id}");
        Ok(())
    }
}

fn get_note(conn: &Connection, note_id: NoteId) -> StoreResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?;"))?;
    let mut rows = stmt.query([note_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<Note> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidRecord(format!("invalid uuid value `{id_text}` in notes.id"))
    })?;

    let tags_json: String = row.get("tags")?;
    let tags = decode_string_array(&tags_json, "notes.tags")?;

    let suggestions = parse_suggestions(
        row.get::<_, Option<String>>("ai_title")?,
        row.get::<_, Option<String>>("ai_summary")?,
        row.get::<_, Option<String>>("ai_suggested_tags")?,
    )?;

    Ok(Note {
        id,
        title: row.get("title")?,
        subtitle: row.get("subtitle")?,
        content: row.get("content")?,
        tags,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        suggestions,
    })
}

fn parse_suggestions(
    title: Option<String>,
    summary: Option<String>,
    suggested_tags: Option<String>,
) -> StoreResult<Option<Suggestions>> {
    match (title, summary, suggested_tags) {
        (None, None, None) => Ok(None),
        (Some(title), Some(summary), Some(raw_tags)) => Ok(Some(Suggestions {
            title,
            summary,
            suggested_tags: decode_string_array(&raw_tags, "notes.ai_suggested_tags")?,
        })),
        _ => Err(StoreError::InvalidRecord(
            "suggestion columns must be all set or all null".to_string(),
        )),
    }
}

fn encode_string_array(values: &[String]) -> StoreResult<String> {
    serde_json::to_string(values)
        .map_err(|err| StoreError::InvalidRecord(format!("failed to encode string array: {err}")))
}

fn decode_string_array(raw: &str, column: &str) -> StoreResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::InvalidRecord(format!("invalid JSON array in {column}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_stamp_the_user_version() {
        let store = SqliteNoteStore::open_in_memory().expect("open");
        let version: u32 = store
            .lock_conn()
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("read user_version");
        assert_eq!(version, latest_schema_version());
    }

    #[test]
    fn newer_database_versions_are_rejected() {
        let mut conn = Connection::open_in_memory().expect("open raw");
        conn.pragma_update(None, "user_version", 99).expect("bump");
        let err = apply_migrations(&mut conn).expect_err("must refuse newer schema");
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn suggestion_columns_are_all_or_nothing() {
        assert!(parse_suggestions(None, None, None)
            .expect("all null is absent")
            .is_none());

        let present = parse_suggestions(
            Some("t".to_string()),
            Some("s".to_string()),
            Some("[\"Tag\"]".to_string()),
        )
        .expect("all set is present")
        .expect("bundle");
        assert_eq!(present.suggested_tags, ["Tag"]);

        assert!(parse_suggestions(Some("t".to_string()), None, None).is_err());
    }

    #[test]
    fn string_arrays_reject_malformed_json() {
        assert!(decode_string_array("[\"a\",\"b\"]", "col").is_ok());
        assert!(decode_string_array("not json", "col").is_err());
    }
}
