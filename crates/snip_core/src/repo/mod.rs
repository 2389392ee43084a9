//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from search and archive orchestration.
//!
//! # Invariants
//! - Only `note_store` writes the `notes_fts` index.
//! - Repository APIs return semantic errors (`NoteNotFound`, `Integrity`) in
//!   addition to storage transport errors, and never retry.

use crate::db::DbError;
use crate::model::note::{NoteId, ValidationError};
use crate::model::tag::TagId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note_repo;
pub mod note_store;
pub mod tag_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy shared by storage, tag and note repositories.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input rejected before any write.
    Validation(ValidationError),
    /// Storage medium unavailable or write rejected.
    Storage(DbError),
    NoteNotFound(NoteId),
    TagNotFound(TagId),
    /// Note table and full-text index disagree.
    Integrity(String),
}

impl RepoError {
    /// Returns whether this error reports an absent note or tag.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoteNotFound(_) | Self::TagNotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::Integrity(message) => write!(f, "index integrity violation: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::NoteNotFound(_) | Self::TagNotFound(_) | Self::Integrity(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}
