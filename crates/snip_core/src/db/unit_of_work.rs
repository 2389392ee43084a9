//! SAVEPOINT-backed write scope.
//!
//! # Responsibility
//! - Group several statements into one atomic unit visible to readers only
//!   after commit.
//! - Allow nesting: a repository unit can wrap store and tag writes that
//!   each open their own unit.
//!
//! # Invariants
//! - Dropping an uncommitted unit rolls back everything written inside it.
//! - Savepoint names are static identifiers, never user input.

use super::DbResult;
use log::warn;
use rusqlite::Connection;

/// Atomic write scope with RAII rollback.
pub struct UnitOfWork<'conn> {
    conn: &'conn Connection,
    name: &'static str,
    finished: bool,
}

impl<'conn> UnitOfWork<'conn> {
    /// Opens a savepoint named `name` on `conn`.
    ///
    /// Outside a transaction this starts one; inside a transaction (or an
    /// outer unit) it nests.
    pub fn begin(conn: &'conn Connection, name: &'static str) -> DbResult<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            name,
            finished: false,
        })
    }

    /// Connection the unit writes through.
    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }

    /// Makes the writes permanent (or part of the enclosing unit).
    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch(&format!("RELEASE {};", self.name))?;
        self.finished = true;
        Ok(())
    }

    /// Discards every write made inside the unit.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0};", self.name))?;
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0};", self.name))
        {
            warn!(
                "event=uow_rollback module=db status=error savepoint={} error={}",
                self.name, err
            );
        }
    }
}
