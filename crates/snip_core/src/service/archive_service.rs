//! Archive use-case service: export, import and file backups.
//!
//! # Responsibility
//! - Serialize every note with its tags into a versioned JSON envelope.
//! - Re-create archived notes through the note repository.
//! - Snapshot the whole database into a standalone file.
//!
//! # Invariants
//! - Imports go through `NoteRepository::create`, so every imported note is
//!   indexed; an import either lands completely or not at all.
//! - Backups never overwrite an existing file.

use crate::db::UnitOfWork;
use crate::model::note::now_epoch_ms;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::RepoError;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Envelope version written by this binary.
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Service error for archive use-cases.
#[derive(Debug)]
pub enum ArchiveError {
    Repo(RepoError),
    Serialization(serde_json::Error),
    Io(std::io::Error),
    /// Backup destination already exists.
    BackupTargetExists(PathBuf),
    /// Archive was written by a newer format.
    UnsupportedArchiveVersion { found: u32, supported: u32 },
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "invalid archive document: {err}"),
            Self::Io(err) => write!(f, "archive i/o failed: {err}"),
            Self::BackupTargetExists(path) => {
                write!(f, "backup target already exists: {}", path.display())
            }
            Self::UnsupportedArchiveVersion { found, supported } => write!(
                f,
                "archive version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::BackupTargetExists(_) | Self::UnsupportedArchiveVersion { .. } => None,
        }
    }
}

impl From<RepoError> for ArchiveError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<crate::db::DbError> for ArchiveError {
    fn from(value: crate::db::DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Portable export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesArchive {
    pub version: u32,
    /// Export time in epoch milliseconds.
    pub exported_at: i64,
    /// Notes ordered most recently created first.
    pub notes: Vec<ArchivedNote>,
}

/// One exported note. Identity is not carried over; imports assign new ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedNote {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Archive facade over a note repository.
pub struct ArchiveService<'conn> {
    repo: SqliteNoteRepository<'conn>,
}

impl<'conn> ArchiveService<'conn> {
    pub fn new(repo: SqliteNoteRepository<'conn>) -> Self {
        Self { repo }
    }

    /// Captures every note with its tags.
    pub fn export(&self) -> ArchiveResult<NotesArchive> {
        let notes = self
            .repo
            .list_all()?
            .into_iter()
            .map(|record| ArchivedNote {
                title: record.title,
                body: record.body,
                tags: record.tags,
                created_at: record.created_at,
                updated_at: record.updated_at,
            })
            .collect::<Vec<_>>();

        info!(
            "event=notes_export module=archive status=ok notes={}",
            notes.len()
        );
        Ok(NotesArchive {
            version: ARCHIVE_FORMAT_VERSION,
            exported_at: now_epoch_ms(),
            notes,
        })
    }

    /// Export rendered as pretty-printed JSON.
    pub fn export_json(&self) -> ArchiveResult<String> {
        Ok(serde_json::to_string_pretty(&self.export()?)?)
    }

    /// Re-creates archived notes in one unit of work; returns the count.
    ///
    /// Notes are inserted oldest first so relative recency is preserved.
    pub fn import(&self, archive: &NotesArchive) -> ArchiveResult<usize> {
        if archive.version > ARCHIVE_FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedArchiveVersion {
                found: archive.version,
                supported: ARCHIVE_FORMAT_VERSION,
            });
        }

        let uow = UnitOfWork::begin(self.repo.conn(), "notes_import")?;
        for note in archive.notes.iter().rev() {
            self.repo.create(&note.title, &note.body, &note.tags)?;
        }
        uow.commit()?;

        info!(
            "event=notes_import module=archive status=ok notes={}",
            archive.notes.len()
        );
        Ok(archive.notes.len())
    }

    /// Parses a JSON export and imports it.
    pub fn import_json(&self, json: &str) -> ArchiveResult<usize> {
        let archive: NotesArchive = serde_json::from_str(json)?;
        self.import(&archive)
    }

    /// Writes a consistent snapshot of the database to `target`.
    pub fn backup_to(&self, target: impl AsRef<Path>) -> ArchiveResult<PathBuf> {
        let target = target.as_ref();
        if target.exists() {
            return Err(ArchiveError::BackupTargetExists(target.to_path_buf()));
        }
        if let Some(parent) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let target_text = target.to_string_lossy().into_owned();
        self.repo
            .conn()
            .execute("VACUUM INTO ?1;", [target_text.as_str()])?;

        info!(
            "event=db_backup module=archive status=ok target={}",
            target.display()
        );
        Ok(target.to_path_buf())
    }
}
