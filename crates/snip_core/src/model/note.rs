//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note row and its read model with tags.
//! - Validate caller input before it reaches storage.
//!
//! # Invariants
//! - `id` is assigned on insert and immutable afterwards.
//! - `created_at` is set once; `updated_at >= created_at` at all times and
//!   strictly greater after any update.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage-assigned note identity.
pub type NoteId = i64;

/// Canonical note row as stored in `notes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub body: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Read model for note detail/list use-cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// Normalized tag names, sorted ascending.
    pub tags: Vec<String>,
}

impl NoteRecord {
    /// Combines a stored note with its tag names.
    pub fn from_note(note: Note, tags: Vec<String>) -> Self {
        Self {
            id: note.id,
            title: note.title,
            body: note.body,
            created_at: note.created_at,
            updated_at: note.updated_at,
            tags,
        }
    }
}

/// Input rejected at the repository boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty after trimming.
    EmptyTitle,
    /// Tag name is empty after normalization.
    BlankTagName(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "note title must not be empty"),
            Self::BlankTagName(raw) => write!(f, "invalid tag name: `{raw}`"),
        }
    }
}

impl Error for ValidationError {}

/// Rejects titles that are empty or whitespace only.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

/// Current wall-clock time in epoch milliseconds.
///
/// Clocks set before 1970 collapse to `0` instead of failing a write.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
