//! Note repository: the note-level surface consumed by handlers.
//!
//! # Responsibility
//! - Combine the note store and the tag repository into note-level
//!   create/update/delete/query operations.
//! - Validate caller input (title, tag names) before any write.
//! - Create unknown tag names implicitly.
//!
//! # Invariants
//! - Each write runs in one unit of work covering the note row, its index
//!   entry and its tag links.
//! - Note lists are sorted by `created_at DESC, id DESC`, except
//!   [`NoteRepository::recent`] which follows `updated_at`.
//! - Tag names on returned records are normalized and sorted ascending.

use crate::db::UnitOfWork;
use crate::model::note::{validate_title, Note, NoteId, NoteRecord};
use crate::model::tag::normalize_tag_names;
use crate::repo::note_store::{NoteStore, SqliteNoteStore};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use crate::repo::RepoResult;
use log::info;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::time::Instant;

const NOTES_DEFAULT_LIMIT: u32 = 10;
const NOTES_LIMIT_MAX: u32 = 50;

/// Repository interface for note-level use-cases.
pub trait NoteRepository {
    /// Creates a note with the given tag names and returns its read model.
    fn create(&self, title: &str, body: &str, tag_names: &[String]) -> RepoResult<NoteRecord>;
    /// Replaces title and body.
    fn update(&self, id: NoteId, title: &str, body: &str) -> RepoResult<NoteRecord>;
    /// Replaces only the provided fields.
    fn patch(&self, id: NoteId, title: Option<&str>, body: Option<&str>)
        -> RepoResult<NoteRecord>;
    fn delete(&self, id: NoteId) -> RepoResult<()>;
    fn get(&self, id: NoteId) -> RepoResult<NoteRecord>;
    fn list_all(&self) -> RepoResult<Vec<NoteRecord>>;
    /// Most recently updated notes. Limit defaults to 10 and clamps to 50.
    fn recent(&self, limit: Option<u32>) -> RepoResult<Vec<NoteRecord>>;
    /// Notes carrying every one of `tag_names`.
    fn find_by_tags(&self, tag_names: &[String]) -> RepoResult<Vec<NoteRecord>>;
    /// Replaces the whole tag set of a note.
    fn set_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord>;
    fn add_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord>;
    fn remove_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
    store: SqliteNoteStore<'conn>,
    tags: SqliteTagRepository<'conn>,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a connection returned by `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self {
            conn,
            store: SqliteNoteStore::try_new(conn)?,
            tags: SqliteTagRepository::try_new(conn)?,
        })
    }

    /// Storage engine, for index verification and rebuild.
    pub fn store(&self) -> &SqliteNoteStore<'conn> {
        &self.store
    }

    /// Tag layer, for tag-level queries.
    pub fn tags(&self) -> &SqliteTagRepository<'conn> {
        &self.tags
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }

    fn hydrate(&self, note: Note) -> RepoResult<NoteRecord> {
        let tags = self
            .tags
            .tags_for_note(note.id)?
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        Ok(NoteRecord::from_note(note, tags))
    }

    fn hydrate_all(&self, notes: Vec<Note>) -> RepoResult<Vec<NoteRecord>> {
        notes.into_iter().map(|note| self.hydrate(note)).collect()
    }

    fn attach_names(&self, id: NoteId, names: &[String]) -> RepoResult<()> {
        for name in names {
            let tag = self.tags.ensure_tag(name)?;
            self.tags.attach_tag(id, tag.id)?;
        }
        Ok(())
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create(&self, title: &str, body: &str, tag_names: &[String]) -> RepoResult<NoteRecord> {
        let started_at = Instant::now();
        validate_title(title)?;
        let names = normalize_tag_names(tag_names)?;

        let uow = UnitOfWork::begin(self.conn, "note_create")?;
        let id = self.store.insert(title, body)?;
        self.attach_names(id, &names)?;
        uow.commit()?;

        info!(
            "event=note_create module=repo status=ok note_id={} tag_count={} duration_ms={}",
            id,
            names.len(),
            started_at.elapsed().as_millis()
        );
        self.get(id)
    }

    fn update(&self, id: NoteId, title: &str, body: &str) -> RepoResult<NoteRecord> {
        validate_title(title)?;
        self.store.update(id, title, body)?;
        info!("event=note_update module=repo status=ok note_id={id}");
        self.get(id)
    }

    fn patch(
        &self,
        id: NoteId,
        title: Option<&str>,
        body: Option<&str>,
    ) -> RepoResult<NoteRecord> {
        let current = self.store.get(id)?;
        if title.is_none() && body.is_none() {
            return self.hydrate(current);
        }

        let title = title.unwrap_or(current.title.as_str());
        let body = body.unwrap_or(current.body.as_str());
        self.update(id, title, body)
    }

    fn delete(&self, id: NoteId) -> RepoResult<()> {
        self.store.delete(id)?;
        info!("event=note_delete module=repo status=ok note_id={id}");
        Ok(())
    }

    fn get(&self, id: NoteId) -> RepoResult<NoteRecord> {
        let note = self.store.get(id)?;
        self.hydrate(note)
    }

    fn list_all(&self) -> RepoResult<Vec<NoteRecord>> {
        let notes = self.store.list_all()?;
        self.hydrate_all(notes)
    }

    fn recent(&self, limit: Option<u32>) -> RepoResult<Vec<NoteRecord>> {
        let notes = self.store.list_recent(normalize_note_limit(limit))?;
        self.hydrate_all(notes)
    }

    fn find_by_tags(&self, tag_names: &[String]) -> RepoResult<Vec<NoteRecord>> {
        let names = normalize_tag_names(tag_names)?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut matching: Option<BTreeSet<NoteId>> = None;
        for name in &names {
            let Some(tag) = self.tags.find_tag(name)? else {
                return Ok(Vec::new());
            };
            let ids = self.tags.notes_for_tag(tag.id)?;
            matching = Some(match matching {
                Some(current) => current.intersection(&ids).copied().collect(),
                None => ids,
            });
        }

        let mut notes = matching
            .unwrap_or_default()
            .into_iter()
            .map(|id| self.store.get(id))
            .collect::<RepoResult<Vec<_>>>()?;
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.hydrate_all(notes)
    }

    fn set_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord> {
        let names = normalize_tag_names(tag_names)?;

        let uow = UnitOfWork::begin(self.conn, "note_set_tags")?;
        for tag in self.tags.tags_for_note(id)? {
            if !names.contains(&tag.name) {
                self.tags.detach_tag(id, tag.id)?;
            }
        }
        self.attach_names(id, &names)?;
        uow.commit()?;

        self.get(id)
    }

    fn add_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord> {
        let names = normalize_tag_names(tag_names)?;
        let uow = UnitOfWork::begin(self.conn, "note_add_tags")?;
        self.attach_names(id, &names)?;
        uow.commit()?;
        self.get(id)
    }

    fn remove_tags(&self, id: NoteId, tag_names: &[String]) -> RepoResult<NoteRecord> {
        let names = normalize_tag_names(tag_names)?;
        // Fails with NoteNotFound before any detach.
        self.store.get(id)?;

        let uow = UnitOfWork::begin(self.conn, "note_remove_tags")?;
        for name in &names {
            if let Some(tag) = self.tags.find_tag(name)? {
                self.tags.detach_tag(id, tag.id)?;
            }
        }
        uow.commit()?;

        self.get(id)
    }
}

/// Normalizes a list limit: `None`/`0` become 10, values above 50 clamp.
pub fn normalize_note_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTES_DEFAULT_LIMIT,
        Some(value) if value > NOTES_LIMIT_MAX => NOTES_LIMIT_MAX,
        Some(value) => value,
    }
}
