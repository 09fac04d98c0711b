use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use studentd::model::{CourseRef, NewStudent, StudentFilter};
use studentd::store::{
    DeleteMode, MemoryStore, SqliteStore, StoreError, StoreOptions, StudentStore,
};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn soft() -> StoreOptions {
    StoreOptions {
        delete_mode: DeleteMode::Soft,
        unique_names: true,
    }
}

fn student(roll: &str, name: &str, email: &str) -> NewStudent {
    NewStudent {
        roll_number: Some(roll.to_string()),
        name: name.to_string(),
        email: email.to_string(),
        course: CourseRef::ById(1),
        age: 21,
    }
}

fn exercise_soft_delete(store: &dyn StudentStore) -> i64 {
    let a = store
        .create_student(&student("R-001", "Alan Turing", "alan@example.com"))
        .expect("create");
    let b = store
        .create_student(&student("R-002", "Kurt Godel", "kurt@example.com"))
        .expect("create second");

    assert!(store.delete_student(a.id).expect("soft delete"));
    assert!(!store.delete_student(a.id).expect("second delete"));
    assert!(store.get_student(a.id).expect("get").is_none());

    let live = store
        .list_students(&StudentFilter::default())
        .expect("list");
    assert_eq!(live.iter().map(|s| s.id).collect::<Vec<_>>(), vec![b.id]);

    // A hidden row cannot be updated.
    let updated = store
        .update_student(a.id, &student("R-001", "Alan Turing", "alan@example.com"))
        .expect("update");
    assert!(updated.is_none());

    // Roll number and email of the deleted row are free again.
    let again = store
        .create_student(&student("R-001", "Alan Turing", "alan@example.com"))
        .expect("re-register after soft delete");
    assert_ne!(again.id, a.id);

    // Live rows still collide.
    match store.create_student(&student("R-002", "Other Person", "other@example.com")) {
        Err(StoreError::Duplicate { .. }) => {}
        other => panic!("expected duplicate, got {other:?}"),
    }
    a.id
}

#[test]
fn memory_store_soft_delete_hides_rows() {
    let store = MemoryStore::new(soft());
    exercise_soft_delete(&store);
}

#[test]
fn sqlite_store_soft_delete_keeps_rows_flagged() {
    let dir = temp_dir("studentd-soft-delete");
    let db_path = dir.join("students.sqlite3");
    let store: Arc<dyn StudentStore> =
        Arc::new(SqliteStore::open(&db_path, soft()).expect("open sqlite store"));

    let deleted_id = exercise_soft_delete(store.as_ref());
    drop(store);

    let conn = Connection::open(&db_path).expect("reopen db");
    let is_deleted: i64 = conn
        .query_row(
            "SELECT is_deleted FROM students WHERE id = ?",
            [deleted_id],
            |r| r.get(0),
        )
        .expect("deleted row still present");
    assert_eq!(is_deleted, 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn hard_delete_removes_sqlite_rows() {
    let dir = temp_dir("studentd-hard-delete");
    let db_path = dir.join("students.sqlite3");
    let store = SqliteStore::open(&db_path, StoreOptions::default()).expect("open sqlite store");
    let s = store
        .create_student(&student("R-010", "Emmy Noether", "emmy@example.com"))
        .expect("create");
    assert!(store.delete_student(s.id).expect("delete"));
    drop(store);

    let conn = Connection::open(&db_path).expect("reopen db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
        .expect("count");
    assert_eq!(count, 0);

    let _ = std::fs::remove_dir_all(dir);
}
