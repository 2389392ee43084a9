//! Full-text search entry points.
//!
//! # Responsibility
//! - Expose query APIs backed by the SQLite FTS5 note index.
//! - Keep query shaping and result hydration inside core.

pub mod fts;
