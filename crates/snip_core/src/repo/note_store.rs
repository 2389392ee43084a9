//! Note storage engine: the `notes` table plus its FTS5 projection.
//!
//! # Responsibility
//! - Provide durable CRUD over canonical note rows.
//! - Keep `notes_fts` in lockstep with `notes` by writing both inside one
//!   [`UnitOfWork`].
//! - Detect and repair index drift caused by writers outside the core.
//!
//! # Invariants
//! - For every row in `notes` there is exactly one `notes_fts` row with
//!   `rowid = notes.id` and identical title/body, and no other index rows.
//! - A failure between the row write and the index write rolls back both.
//! - `updated_at` strictly increases on every update.

use crate::db::{ensure_tables, UnitOfWork};
use crate::model::note::{now_epoch_ms, Note, NoteId};
use crate::repo::{RepoError, RepoResult};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    created_at,
    updated_at
FROM notes";

/// Result of comparing `notes` against `notes_fts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Notes without an index entry.
    pub missing: Vec<NoteId>,
    /// Index entries without a note.
    pub orphaned: Vec<NoteId>,
    /// Index entries whose title/body differ from the note row.
    pub stale: Vec<NoteId>,
}

impl IndexReport {
    /// Returns whether the index mirrors the note table exactly.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.stale.is_empty()
    }
}

/// Storage interface for note rows and their index projection.
pub trait NoteStore {
    /// Writes a new note and its index entry; returns the assigned id.
    fn insert(&self, title: &str, body: &str) -> RepoResult<NoteId>;
    /// Replaces title/body and the index projection.
    fn update(&self, id: NoteId, title: &str, body: &str) -> RepoResult<()>;
    /// Removes the note, its index entry and (by cascade) its tag links.
    fn delete(&self, id: NoteId) -> RepoResult<()>;
    fn get(&self, id: NoteId) -> RepoResult<Note>;
    /// Lists every note, most recently created first.
    fn list_all(&self) -> RepoResult<Vec<Note>>;
    /// Lists at most `limit` notes, most recently updated first.
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Note>>;
    fn count(&self) -> RepoResult<u64>;
    /// Compares the index against the note table without modifying either.
    fn verify_index(&self) -> RepoResult<IndexReport>;
    /// Re-projects every note into a fresh index; returns indexed rows.
    fn rebuild_index(&self) -> RepoResult<usize>;
}

/// SQLite-backed note store.
pub struct SqliteNoteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteStore<'conn> {
    /// Constructs a store from a connection returned by `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["notes", "notes_fts"])?;
        Ok(Self { conn })
    }
}

impl NoteStore for SqliteNoteStore<'_> {
    fn insert(&self, title: &str, body: &str) -> RepoResult<NoteId> {
        let uow = UnitOfWork::begin(self.conn, "note_insert")?;
        let now = now_epoch_ms();

        uow.conn().execute(
            "INSERT INTO notes (title, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3);",
            params![title, body, now],
        )?;
        let id = uow.conn().last_insert_rowid();
        uow.conn().execute(
            "INSERT INTO notes_fts (rowid, title, body) VALUES (?1, ?2, ?3);",
            params![id, title, body],
        )?;

        uow.commit()?;
        debug!("event=note_insert module=store status=ok note_id={id}");
        Ok(id)
    }

    fn update(&self, id: NoteId, title: &str, body: &str) -> RepoResult<()> {
        let uow = UnitOfWork::begin(self.conn, "note_update")?;

        let changed = uow.conn().execute(
            "UPDATE notes
             SET
                title = ?2,
                body = ?3,
                updated_at = MAX(?4, updated_at + 1)
             WHERE id = ?1;",
            params![id, title, body, now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }

        let indexed = uow.conn().execute(
            "UPDATE notes_fts SET title = ?2, body = ?3 WHERE rowid = ?1;",
            params![id, title, body],
        )?;
        if indexed == 0 {
            warn!("event=note_update module=store status=error note_id={id} error_code=index_entry_missing");
            return Err(RepoError::Integrity(format!(
                "note {id} has no index entry"
            )));
        }

        uow.commit()?;
        debug!("event=note_update module=store status=ok note_id={id}");
        Ok(())
    }

    fn delete(&self, id: NoteId) -> RepoResult<()> {
        let uow = UnitOfWork::begin(self.conn, "note_delete")?;

        let changed = uow
            .conn()
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }

        let removed = uow
            .conn()
            .execute("DELETE FROM notes_fts WHERE rowid = ?1;", [id])?;
        if removed == 0 {
            warn!("event=note_delete module=store status=error note_id={id} error_code=index_entry_missing");
            return Err(RepoError::Integrity(format!(
                "note {id} has no index entry"
            )));
        }

        uow.commit()?;
        debug!("event=note_delete module=store status=ok note_id={id}");
        Ok(())
    }

    fn get(&self, id: NoteId) -> RepoResult<Note> {
        self.conn
            .query_row(
                &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_note_row,
            )
            .optional()?
            .ok_or(RepoError::NoteNotFound(id))
    }

    fn list_all(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} ORDER BY created_at DESC, id DESC;"
        ))?;
        let notes = stmt
            .query_map([], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} ORDER BY updated_at DESC, id DESC LIMIT ?1;"
        ))?;
        let notes = stmt
            .query_map([i64::from(limit)], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn verify_index(&self) -> RepoResult<IndexReport> {
        let report = IndexReport {
            missing: query_ids(
                self.conn,
                "SELECT n.id
                 FROM notes n
                 WHERE NOT EXISTS (SELECT 1 FROM notes_fts f WHERE f.rowid = n.id)
                 ORDER BY n.id;",
            )?,
            orphaned: query_ids(
                self.conn,
                "SELECT f.rowid
                 FROM notes_fts f
                 WHERE NOT EXISTS (SELECT 1 FROM notes n WHERE n.id = f.rowid)
                 ORDER BY f.rowid;",
            )?,
            stale: query_ids(
                self.conn,
                "SELECT n.id
                 FROM notes n
                 JOIN notes_fts f ON f.rowid = n.id
                 WHERE f.title IS NOT n.title
                    OR f.body IS NOT n.body
                 ORDER BY n.id;",
            )?,
        };

        if !report.is_consistent() {
            warn!(
                "event=index_verify module=store status=drift missing={} orphaned={} stale={}",
                report.missing.len(),
                report.orphaned.len(),
                report.stale.len()
            );
        }
        Ok(report)
    }

    fn rebuild_index(&self) -> RepoResult<usize> {
        let uow = UnitOfWork::begin(self.conn, "index_rebuild")?;
        uow.conn().execute("DELETE FROM notes_fts;", [])?;
        let indexed = uow.conn().execute(
            "INSERT INTO notes_fts (rowid, title, body)
             SELECT id, title, body FROM notes;",
            [],
        )?;
        uow.commit()?;

        info!("event=index_rebuild module=store status=ok indexed={indexed}");
        Ok(indexed)
    }
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query_ids(conn: &Connection, sql: &str) -> RepoResult<Vec<NoteId>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, NoteId>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
