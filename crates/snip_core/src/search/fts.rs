//! SQLite FTS5-based note search.
//!
//! # Responsibility
//! - Turn free text into an FTS5 `MATCH` expression.
//! - Combine full-text matches with relational tag filters.
//! - Hydrate hits into [`NoteRecord`]s through the note repository.
//!
//! # Invariants
//! - Blank free text returns no hits; it never means "match all".
//! - An index entry whose note row is missing is reported as
//!   [`RepoError::Integrity`], never skipped.
//! - Result ordering is deterministic (ties broken by recency, then id).

use crate::model::note::{NoteId, NoteRecord};
use crate::model::tag::normalize_tag_names;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::RepoError;
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TAG_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)tag:(\S+)").expect("valid tag term regex"));

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing and repository interaction.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Repo(RepoError),
}

impl SearchError {
    /// Returns whether the index referenced a note that does not exist.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Repo(RepoError::Integrity(_)))
    }
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SearchError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Ordering applied to matched notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchOrder {
    /// Most recently created first.
    #[default]
    Recent,
    /// FTS5 `bm25` rank, ties broken by recency.
    Relevance,
}

/// Search options for full-text query behavior.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// User query text. `tag:<name>` tokens become tag filters.
    pub text: String,
    /// Tag names every hit must carry.
    pub tags: Vec<String>,
    pub order: SearchOrder,
    /// Maximum number of hits; `None` returns every hit.
    pub limit: Option<u32>,
    /// Whether to pass text directly as raw FTS5 expression.
    ///
    /// Default is `false` so punctuation in user input cannot break the query.
    pub raw_fts_syntax: bool,
}

impl SearchQuery {
    /// Creates a query ordered by recency, without tag filters or limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Searches notes via FTS5 and returns hydrated records.
///
/// Returns an empty list for blank queries.
pub fn search_notes(conn: &Connection, query: &SearchQuery) -> SearchResult<Vec<NoteRecord>> {
    let (free_text, lifted_tags) = split_tag_terms(&query.text);
    let Some(match_expr) = build_match_expression(&free_text, query.raw_fts_syntax) else {
        return Ok(Vec::new());
    };
    if query.limit == Some(0) {
        return Ok(Vec::new());
    }

    let mut tag_filters = query.tags.clone();
    tag_filters.extend(lifted_tags);
    let tag_filters = normalize_tag_names(&tag_filters).map_err(RepoError::from)?;

    let ids = matching_note_ids(conn, &match_expr, &tag_filters, query)?;
    debug!(
        "event=note_search module=search status=ok hits={} tag_filters={}",
        ids.len(),
        tag_filters.len()
    );

    let repo = SqliteNoteRepository::try_new(conn)?;
    ids.into_iter()
        .map(|id| {
            repo.get(id).map_err(|err| match err {
                RepoError::NoteNotFound(missing) => RepoError::Integrity(format!(
                    "index entry {missing} references a missing note"
                )),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(SearchError::from)
}

fn matching_note_ids(
    conn: &Connection,
    match_expr: &str,
    tag_filters: &[String],
    query: &SearchQuery,
) -> SearchResult<Vec<NoteId>> {
    let mut sql = String::from(
        "SELECT
            notes_fts.rowid AS index_id,
            notes.id AS note_id
         FROM notes_fts
         LEFT JOIN notes ON notes.id = notes_fts.rowid
         WHERE notes_fts MATCH ?",
    );
    let mut bind_values: Vec<Value> = vec![Value::Text(match_expr.to_string())];

    for tag in tag_filters {
        sql.push_str(
            " AND EXISTS (
                SELECT 1
                FROM note_tags nt
                INNER JOIN tags t ON t.id = nt.tag_id
                WHERE nt.note_id = notes_fts.rowid
                  AND t.name = ? COLLATE NOCASE
            )",
        );
        bind_values.push(Value::Text(tag.clone()));
    }

    match query.order {
        SearchOrder::Recent => {
            sql.push_str(" ORDER BY notes.created_at DESC, notes_fts.rowid DESC")
        }
        SearchOrder::Relevance => sql.push_str(
            " ORDER BY bm25(notes_fts), notes.created_at DESC, notes_fts.rowid DESC",
        ),
    }
    sql.push_str(" LIMIT ?");
    bind_values.push(Value::Integer(query.limit.map_or(-1, i64::from)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, match_expr))?;

    let mut ids = Vec::new();
    while let Some(row) = rows.next().map_err(|err| map_query_error(err, match_expr))? {
        let index_id: NoteId = row.get("index_id")?;
        let note_id: Option<NoteId> = row.get("note_id")?;
        match note_id {
            Some(id) => ids.push(id),
            None => {
                error!(
                    "event=note_search module=search status=error error_code=dangling_index_entry index_id={index_id}"
                );
                return Err(RepoError::Integrity(format!(
                    "index entry {index_id} references a missing note"
                ))
                .into());
            }
        }
    }

    Ok(ids)
}

/// Splits `tag:<name>` tokens out of free text.
fn split_tag_terms(text: &str) -> (String, Vec<String>) {
    let tags = TAG_TERM_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect::<Vec<_>>();
    let remaining = TAG_TERM_RE.replace_all(text, " ").into_owned();
    (remaining, tags)
}

fn build_match_expression(text: &str, raw_fts_syntax: bool) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if raw_fts_syntax {
        return Some(text.to_string());
    }

    // Words without a letter or digit tokenize to an empty phrase.
    let terms = text
        .split_whitespace()
        .map(|term| term.replace('\0', ""))
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| escape_fts_term(&term))
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::from(err)
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
                || msg.contains("no such column")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_match_expression, split_tag_terms};

    #[test]
    fn terms_are_quoted_and_joined_with_and() {
        assert_eq!(
            build_match_expression("alpha  beta", false).as_deref(),
            Some("\"alpha\" AND \"beta\"")
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(
            build_match_expression("say\"hi", false).as_deref(),
            Some("\"say\"\"hi\"")
        );
    }

    #[test]
    fn blank_text_builds_no_expression() {
        assert_eq!(build_match_expression("  \t ", false), None);
        assert_eq!(build_match_expression("", true), None);
    }

    #[test]
    fn punctuation_only_words_are_dropped() {
        assert_eq!(
            build_match_expression("alpha - review !!!", false).as_deref(),
            Some("\"alpha\" AND \"review\"")
        );
        assert_eq!(build_match_expression("& / -", false), None);
    }

    #[test]
    fn nul_bytes_are_stripped_from_terms() {
        assert_eq!(
            build_match_expression("a\0b", false).as_deref(),
            Some("\"ab\"")
        );
        assert_eq!(build_match_expression("\0", false), None);
    }

    #[test]
    fn tag_tokens_are_lifted_out_of_free_text() {
        let (text, tags) = split_tag_terms("tag:Work meeting TAG:urgent notes");
        assert_eq!(tags, vec!["Work".to_string(), "urgent".to_string()]);
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), ["meeting", "notes"]);
    }

    #[test]
    fn words_containing_tag_prefix_are_kept() {
        let (text, tags) = split_tag_terms("hashtag:x");
        assert!(tags.is_empty());
        assert_eq!(text, "hashtag:x");
    }
}
