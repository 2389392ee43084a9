use rusqlite::Connection;
use snip_core::db::migrations::latest_version;
use snip_core::db::{open_db, open_db_in_memory, DbError, UnitOfWork};
use snip_core::{RepoError, SqliteNoteStore, SqliteTagRepository};

#[test]
fn open_db_in_memory_creates_full_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["notes", "tags", "note_tags", "notes_fts"] {
        assert_table_exists(&conn, table);
    }

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("notes.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO notes (title, body, created_at, updated_at) VALUES ('t', 'b', 1, 1);",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unusable_parent_directory_reports_create_dir_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let err = open_db(blocker.join("nested").join("notes.db")).unwrap_err();
    match err {
        DbError::CreateDir { path, .. } => assert_eq!(path, blocker.join("nested")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_connections_without_schema() {
    let conn = Connection::open_in_memory().unwrap();

    let store_err = SqliteNoteStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        store_err,
        RepoError::Storage(DbError::MissingSchemaObject("notes"))
    ));

    let tags_err = SqliteTagRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        tags_err,
        RepoError::Storage(DbError::MissingSchemaObject("tags"))
    ));
}

#[test]
fn unit_of_work_rolls_back_when_dropped() {
    let conn = open_db_in_memory().unwrap();
    {
        let uow = UnitOfWork::begin(&conn, "test_scope").unwrap();
        uow.conn()
            .execute("INSERT INTO tags (name) VALUES ('dropped');", [])
            .unwrap();
    }
    {
        let uow = UnitOfWork::begin(&conn, "test_scope").unwrap();
        uow.conn()
            .execute("INSERT INTO tags (name) VALUES ('kept');", [])
            .unwrap();
        uow.commit().unwrap();
    }

    let names: Vec<String> = conn
        .prepare("SELECT name FROM tags ORDER BY name;")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names, vec!["kept".to_string()]);
}

#[test]
fn nested_unit_of_work_is_undone_by_outer_rollback() {
    let conn = open_db_in_memory().unwrap();
    let outer = UnitOfWork::begin(&conn, "outer_scope").unwrap();
    let inner = UnitOfWork::begin(&conn, "inner_scope").unwrap();
    inner
        .conn()
        .execute("INSERT INTO tags (name) VALUES ('inner');", [])
        .unwrap();
    inner.commit().unwrap();
    outer.rollback().unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
