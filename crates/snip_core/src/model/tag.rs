//! Tag domain model and name normalization.

use super::note::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Storage-assigned tag identity.
pub type TagId = i64;

/// Tag row. `name` is always normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Normalizes one tag name: trimmed, inner whitespace collapsed, lowercase.
///
/// Returns `None` for names that are blank after trimming.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(WHITESPACE_RE.replace_all(trimmed, " ").to_lowercase())
}

/// Normalizes and deduplicates tag names, rejecting blank entries.
pub fn normalize_tag_names<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, ValidationError> {
    let mut unique = BTreeSet::new();
    for name in raw {
        let name = name.as_ref();
        let normalized = normalize_tag_name(name)
            .ok_or_else(|| ValidationError::BlankTagName(name.to_string()))?;
        unique.insert(normalized);
    }
    Ok(unique.into_iter().collect())
}
