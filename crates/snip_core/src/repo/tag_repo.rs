//! Tag and note/tag association repository.
//!
//! # Responsibility
//! - Own the `tags` and `note_tags` tables.
//! - Provide idempotent attach/detach and lookup in both directions.
//!
//! # Invariants
//! - At most one `note_tags` row exists per `(note_id, tag_id)` pair.
//! - Deleting a note or a tag removes every link referencing it (schema
//!   level `ON DELETE CASCADE`).
//! - Tag names are persisted in normalized form.

use crate::db::{ensure_tables, UnitOfWork};
use crate::model::note::{NoteId, ValidationError};
use crate::model::tag::{normalize_tag_name, Tag, TagId};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

/// Repository interface for tags and their note associations.
pub trait TagRepository {
    /// Finds a tag by name or creates it; `name` is normalized first.
    fn ensure_tag(&self, name: &str) -> RepoResult<Tag>;
    /// Looks a tag up by (normalized) name.
    fn find_tag(&self, name: &str) -> RepoResult<Option<Tag>>;
    /// Lists every tag sorted by name.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Deletes a tag and all of its associations.
    fn delete_tag(&self, tag_id: TagId) -> RepoResult<()>;
    /// Links a note and a tag; linking twice is a no-op.
    fn attach_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<()>;
    /// Unlinks a note and a tag; an absent link is a no-op.
    fn detach_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<()>;
    /// Distinct tags of one note, sorted by name.
    fn tags_for_note(&self, note_id: NoteId) -> RepoResult<Vec<Tag>>;
    /// Ids of notes carrying one tag.
    fn notes_for_tag(&self, tag_id: TagId) -> RepoResult<BTreeSet<NoteId>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Constructs a repository from a connection returned by `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["tags", "note_tags", "notes"])?;
        Ok(Self { conn })
    }

    fn note_exists(&self, note_id: NoteId) -> RepoResult<bool> {
        exists(self.conn, "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);", note_id)
    }

    fn tag_exists(&self, tag_id: TagId) -> RepoResult<bool> {
        exists(self.conn, "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1);", tag_id)
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn ensure_tag(&self, name: &str) -> RepoResult<Tag> {
        let normalized = normalize_tag_name(name)
            .ok_or_else(|| ValidationError::BlankTagName(name.to_string()))?;

        let uow = UnitOfWork::begin(self.conn, "tag_ensure")?;
        uow.conn().execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
            [normalized.as_str()],
        )?;
        let tag = uow.conn().query_row(
            "SELECT id, name FROM tags WHERE name = ?1 COLLATE NOCASE;",
            [normalized.as_str()],
            parse_tag_row,
        )?;
        uow.commit()?;
        Ok(tag)
    }

    fn find_tag(&self, name: &str) -> RepoResult<Option<Tag>> {
        let Some(normalized) = normalize_tag_name(name) else {
            return Ok(None);
        };
        let tag = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE name = ?1 COLLATE NOCASE;",
                [normalized.as_str()],
                parse_tag_row,
            )
            .optional()?;
        Ok(tag)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM tags ORDER BY name COLLATE NOCASE ASC, id ASC;")?;
        let tags = stmt
            .query_map([], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn delete_tag(&self, tag_id: TagId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tags WHERE id = ?1;", [tag_id])?;
        if changed == 0 {
            return Err(RepoError::TagNotFound(tag_id));
        }
        debug!("event=tag_delete module=tags status=ok tag_id={tag_id}");
        Ok(())
    }

    fn attach_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<()> {
        if !self.note_exists(note_id)? {
            return Err(RepoError::NoteNotFound(note_id));
        }
        if !self.tag_exists(tag_id)? {
            return Err(RepoError::TagNotFound(tag_id));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2);",
            params![note_id, tag_id],
        )?;
        Ok(())
    }

    fn detach_tag(&self, note_id: NoteId, tag_id: TagId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM note_tags WHERE note_id = ?1 AND tag_id = ?2;",
            params![note_id, tag_id],
        )?;
        Ok(())
    }

    fn tags_for_note(&self, note_id: NoteId) -> RepoResult<Vec<Tag>> {
        if !self.note_exists(note_id)? {
            return Err(RepoError::NoteNotFound(note_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name
             FROM note_tags nt
             INNER JOIN tags t ON t.id = nt.tag_id
             WHERE nt.note_id = ?1
             ORDER BY t.name COLLATE NOCASE ASC, t.id ASC;",
        )?;
        let tags = stmt
            .query_map([note_id], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn notes_for_tag(&self, tag_id: TagId) -> RepoResult<BTreeSet<NoteId>> {
        if !self.tag_exists(tag_id)? {
            return Err(RepoError::TagNotFound(tag_id));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT note_id FROM note_tags WHERE tag_id = ?1;")?;
        let ids = stmt
            .query_map([tag_id], |row| row.get::<_, NoteId>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }
}

fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn exists(conn: &Connection, sql: &str, id: i64) -> RepoResult<bool> {
    let found: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(found == 1)
}
