use rusqlite::Connection;
use snip_core::db::open_db_in_memory;
use snip_core::{
    search_notes, NoteId, NoteRepository, SearchError, SearchOrder, SearchQuery,
    SqliteNoteRepository,
};
use std::collections::BTreeSet;

fn hit_ids(conn: &Connection, query: &SearchQuery) -> Vec<NoteId> {
    search_notes(conn, query)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect()
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn search_matches_body_terms_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let first = repo.create("Kickoff", "alpha project plan", &[]).unwrap();
    repo.create("Standup", "beta meeting notes", &[]).unwrap();
    let third = repo.create("Retro", "alpha review", &[]).unwrap();

    assert_eq!(
        hit_ids(&conn, &SearchQuery::new("alpha")),
        vec![third.id, first.id]
    );
    assert!(hit_ids(&conn, &SearchQuery::new("gamma")).is_empty());
}

#[test]
fn search_matches_titles_and_requires_every_term() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let both = repo.create("Rust ownership", "borrowing rules", &[]).unwrap();
    repo.create("Rust macros", "hygiene", &[]).unwrap();

    assert_eq!(hit_ids(&conn, &SearchQuery::new("rust")).len(), 2);
    assert_eq!(
        hit_ids(&conn, &SearchQuery::new("rust borrowing")),
        vec![both.id]
    );
}

#[test]
fn blank_query_returns_empty_list() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    repo.create("title", "body", &[]).unwrap();

    assert!(hit_ids(&conn, &SearchQuery::new("")).is_empty());
    assert!(hit_ids(&conn, &SearchQuery::new("   \t")).is_empty());
    assert!(hit_ids(&conn, &SearchQuery::new("tag:anything")).is_empty());
}

#[test]
fn search_reflects_updates_and_deletes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let note = repo.create("Draft", "old wording", &[]).unwrap();

    repo.update(note.id, "Draft", "fresh wording").unwrap();
    assert!(hit_ids(&conn, &SearchQuery::new("old")).is_empty());
    assert_eq!(hit_ids(&conn, &SearchQuery::new("fresh")), vec![note.id]);

    repo.delete(note.id).unwrap();
    assert!(hit_ids(&conn, &SearchQuery::new("fresh")).is_empty());
}

#[test]
fn stemming_matches_inflected_forms() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let note = repo.create("Sprint", "planning the roadmap", &[]).unwrap();

    assert_eq!(hit_ids(&conn, &SearchQuery::new("plan")), vec![note.id]);
    assert_eq!(hit_ids(&conn, &SearchQuery::new("PLANNED")), vec![note.id]);
}

#[test]
fn punctuation_in_plain_queries_is_escaped() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    repo.create("title", "body", &[]).unwrap();

    for text in ["a:b", "\"unbalanced", "AND", "x OR", "(paren", "star*"] {
        let result = search_notes(&conn, &SearchQuery::new(text));
        assert!(result.is_ok(), "query {text:?} failed: {result:?}");
    }
}

#[test]
fn standalone_punctuation_does_not_hide_matches() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let note = repo.create("Retro", "alpha review", &[]).unwrap();

    for text in ["alpha review", "alpha - review", "alpha & review", "alpha / review !!!"] {
        assert_eq!(
            hit_ids(&conn, &SearchQuery::new(text)),
            vec![note.id],
            "query {text:?}"
        );
    }
    assert!(hit_ids(&conn, &SearchQuery::new("- & /")).is_empty());
}

#[test]
fn nul_bytes_in_plain_queries_are_ignored() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let note = repo.create("Retro", "alpha review", &[]).unwrap();

    assert_eq!(hit_ids(&conn, &SearchQuery::new("alp\0ha")), vec![note.id]);
    assert!(hit_ids(&conn, &SearchQuery::new("\0")).is_empty());
}

#[test]
fn raw_syntax_supports_operators_and_reports_invalid_expressions() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let alpha = repo.create("one", "alpha", &[]).unwrap();
    let beta = repo.create("two", "beta", &[]).unwrap();

    let either = SearchQuery {
        raw_fts_syntax: true,
        ..SearchQuery::new("alpha OR beta")
    };
    assert_eq!(
        hit_ids(&conn, &either).into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from([alpha.id, beta.id])
    );

    let broken = SearchQuery {
        raw_fts_syntax: true,
        ..SearchQuery::new("\"unterminated")
    };
    let err = search_notes(&conn, &broken).unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery { .. }));
    assert!(!err.is_integrity_violation());
}

#[test]
fn tag_filters_restrict_hits() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let work = repo
        .create("Budget", "quarterly review", &tags(&["work", "finance"]))
        .unwrap();
    let home = repo
        .create("Garden", "spring review", &tags(&["home"]))
        .unwrap();

    let filtered = SearchQuery {
        tags: tags(&["Work"]),
        ..SearchQuery::new("review")
    };
    assert_eq!(hit_ids(&conn, &filtered), vec![work.id]);

    assert_eq!(
        hit_ids(&conn, &SearchQuery::new("review tag:home")),
        vec![home.id]
    );
    assert_eq!(
        hit_ids(&conn, &SearchQuery::new("tag:work tag:finance review")),
        vec![work.id]
    );
    assert!(hit_ids(&conn, &SearchQuery::new("review tag:unknown")).is_empty());
}

#[test]
fn relevance_order_ranks_denser_matches_first_and_limit_caps_hits() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let dense = repo
        .create("rust", "rust rust rust compiler", &[])
        .unwrap();
    let sparse = repo
        .create(
            "notes",
            "a long body that mentions rust once among many other unrelated words here",
            &[],
        )
        .unwrap();

    let by_relevance = SearchQuery {
        order: SearchOrder::Relevance,
        ..SearchQuery::new("rust")
    };
    assert_eq!(hit_ids(&conn, &by_relevance), vec![dense.id, sparse.id]);
    assert_eq!(
        hit_ids(&conn, &SearchQuery::new("rust")),
        vec![sparse.id, dense.id]
    );

    let limited = SearchQuery {
        limit: Some(1),
        ..SearchQuery::new("rust")
    };
    assert_eq!(hit_ids(&conn, &limited), vec![sparse.id]);

    let none = SearchQuery {
        limit: Some(0),
        ..SearchQuery::new("rust")
    };
    assert!(hit_ids(&conn, &none).is_empty());
}

#[test]
fn dangling_index_entry_is_reported_as_integrity_violation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let note = repo.create("ghost", "haunted body", &[]).unwrap();

    conn.execute("DELETE FROM notes WHERE id = ?1;", [note.id])
        .unwrap();

    let err = search_notes(&conn, &SearchQuery::new("haunted")).unwrap_err();
    assert!(err.is_integrity_violation(), "unexpected error: {err}");
}
