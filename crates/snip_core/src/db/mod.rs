//! SQLite storage bootstrap, schema creation and unit-of-work primitives.
//!
//! # Responsibility
//! - Open and configure SQLite connections for snip core.
//! - Create the schema (notes, tags, links, FTS5 index) exactly once.
//! - Provide the write scope every multi-statement mutation runs in.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before schema creation
//!   succeeds.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Mutex;

pub mod migrations;
mod open;
mod unit_of_work;

pub use open::{open_db, open_db_in_memory};
pub use unit_of_work::UnitOfWork;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Parent directory of a database file could not be created.
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A table the core depends on is absent from the opened database.
    MissingSchemaObject(&'static str),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CreateDir { path, source } => write!(
                f,
                "failed to create database directory `{}`: {source}",
                path.display()
            ),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingSchemaObject(name) => {
                write!(f, "required schema object `{name}` is missing")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CreateDir { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::MissingSchemaObject(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Process-wide storage handle shared between threads.
///
/// Every caller runs on the same connection, one at a time, so the
/// unit-of-work discipline of the repositories also serializes concurrent
/// writers.
pub struct SharedDb {
    conn: Mutex<Connection>,
}

impl SharedDb {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// A poisoned lock is recovered: a panic in another caller cannot leave
    /// an open unit of work behind because [`UnitOfWork`] rolls back on drop.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let guard = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }

    /// Releases the wrapped connection.
    pub fn into_inner(self) -> Connection {
        match self.conn.into_inner() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Returns whether a table (or virtual table) with `name` exists.
pub(crate) fn table_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Fails with [`DbError::MissingSchemaObject`] for the first absent table.
pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> DbResult<()> {
    for table in tables {
        if !table_exists(conn, table)? {
            return Err(DbError::MissingSchemaObject(table));
        }
    }
    Ok(())
}
