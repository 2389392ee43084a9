//! Core note storage for snip.
//! This crate owns the note table, the FTS5 index and the invariant that
//! the two never diverge.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, SharedDb};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::note::{Note, NoteId, NoteRecord, ValidationError};
pub use model::tag::{Tag, TagId};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::note_store::{IndexReport, NoteStore, SqliteNoteStore};
pub use repo::tag_repo::{SqliteTagRepository, TagRepository};
pub use repo::{RepoError, RepoResult};
pub use search::fts::{search_notes, SearchError, SearchOrder, SearchQuery, SearchResult};
pub use service::archive_service::{
    ArchiveError, ArchiveResult, ArchiveService, ArchivedNote, NotesArchive,
    ARCHIVE_FORMAT_VERSION,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
