//! Domain model for notes and tags.
//!
//! # Responsibility
//! - Define the records shared by storage, repository and search layers.
//! - Own write-side validation rules (titles, tag names).
//!
//! # Invariants
//! - Note and tag identities are assigned by storage and never reused.
//! - Tag names are stored in normalized form only.

pub mod note;
pub mod tag;
