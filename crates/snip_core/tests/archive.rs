use snip_core::db::{open_db, open_db_in_memory};
use snip_core::{
    search_notes, ArchiveError, ArchiveService, NoteRepository, NoteStore, SearchQuery,
    SqliteNoteRepository, SqliteNoteStore, TagRepository, ARCHIVE_FORMAT_VERSION,
};

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn export_then_import_rebuilds_notes_tags_and_index() {
    let source = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&source).unwrap();
    repo.create("Groceries", "milk and eggs", &tags(&["home"]))
        .unwrap();
    repo.create("Roadmap", "ship the search feature", &tags(&["work", "plan"]))
        .unwrap();
    let json = ArchiveService::new(repo).export_json().unwrap();

    let target = open_db_in_memory().unwrap();
    let service = ArchiveService::new(SqliteNoteRepository::try_new(&target).unwrap());
    assert_eq!(service.import_json(&json).unwrap(), 2);

    let repo = SqliteNoteRepository::try_new(&target).unwrap();
    let titles = repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|record| record.title)
        .collect::<Vec<_>>();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Groceries".to_string()));
    assert!(titles.contains(&"Roadmap".to_string()));
    assert_eq!(repo.tags().list_tags().unwrap().len(), 3);
    assert!(repo.store().verify_index().unwrap().is_consistent());

    let hits = search_notes(&target, &SearchQuery::new("search")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].tags, tags(&["plan", "work"]));
}

#[test]
fn export_lists_notes_newest_first_with_current_version() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let older = repo.create("older", "", &[]).unwrap();
    let newer = repo.create("newer", "", &[]).unwrap();
    conn.execute(
        "UPDATE notes SET created_at = 1000 WHERE id = ?1;",
        [older.id],
    )
    .unwrap();
    conn.execute(
        "UPDATE notes SET created_at = 2000 WHERE id = ?1;",
        [newer.id],
    )
    .unwrap();

    let archive = ArchiveService::new(repo).export().unwrap();
    assert_eq!(archive.version, ARCHIVE_FORMAT_VERSION);
    let titles = archive
        .notes
        .iter()
        .map(|note| note.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[test]
fn import_rejects_malformed_documents_and_newer_versions() {
    let conn = open_db_in_memory().unwrap();
    let service = ArchiveService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    assert!(matches!(
        service.import_json("{not json").unwrap_err(),
        ArchiveError::Serialization(_)
    ));

    let future = r#"{"version": 99, "exported_at": 0, "notes": []}"#;
    assert!(matches!(
        service.import_json(future).unwrap_err(),
        ArchiveError::UnsupportedArchiveVersion {
            found: 99,
            supported: 1
        }
    ));

    let store = SqliteNoteStore::try_new(&conn).unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn import_with_invalid_note_lands_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = ArchiveService::new(SqliteNoteRepository::try_new(&conn).unwrap());
    let json = r#"{
        "version": 1,
        "exported_at": 0,
        "notes": [
            {"title": "   ", "body": "blank title", "created_at": 2, "updated_at": 2},
            {"title": "valid", "body": "ok", "tags": ["keep"], "created_at": 1, "updated_at": 1}
        ]
    }"#;

    let err = service.import_json(json).unwrap_err();
    assert!(matches!(err, ArchiveError::Repo(_)));

    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    assert_eq!(repo.store().count().unwrap(), 0);
    assert!(repo.tags().list_tags().unwrap().is_empty());
    assert!(repo.store().verify_index().unwrap().is_consistent());
}

#[test]
fn backup_writes_a_reopenable_snapshot_once() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("live.db")).unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    repo.create("persisted", "snapshot body", &tags(&["backup"]))
        .unwrap();
    let service = ArchiveService::new(repo);

    let target = dir.path().join("backups").join("snapshot.db");
    assert_eq!(service.backup_to(&target).unwrap(), target);

    let restored = open_db(&target).unwrap();
    let restored_repo = SqliteNoteRepository::try_new(&restored).unwrap();
    assert_eq!(restored_repo.store().count().unwrap(), 1);
    assert!(restored_repo.store().verify_index().unwrap().is_consistent());
    assert_eq!(
        search_notes(&restored, &SearchQuery::new("snapshot"))
            .unwrap()
            .len(),
        1
    );

    assert!(matches!(
        service.backup_to(&target).unwrap_err(),
        ArchiveError::BackupTargetExists(_)
    ));
}
