use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use studentd::db;
use studentd::model::{CourseRef, NewStudent, StudentFilter};
use studentd::store::{DeleteMode, SqliteStore, StoreOptions, StudentStore};

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

/// The table layout written by the plain name/email/course/age service.
fn write_basic_schema(path: &std::path::Path) {
    let conn = Connection::open(path).expect("create basic db");
    conn.execute_batch(
        "CREATE TABLE students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            course TEXT NOT NULL,
            age INTEGER CHECK (age >= 16 AND age <= 100)
         );
         INSERT INTO students (name, email, course, age) VALUES
            ('John Doe', 'john@email.com', 'Computer Science', 20),
            ('Jane Smith', 'jane@email.com', 'Mathematics', 22);",
    )
    .expect("seed basic db");
}

#[test]
fn basic_schema_is_upgraded_in_place() {
    let dir = temp_dir("studentd-db-migration");
    let db_path = dir.join("students.sqlite3");
    write_basic_schema(&db_path);

    let conn = db::open_db(&db_path).expect("open and migrate");
    for column in ["roll_number", "course_id", "is_deleted", "created_at", "updated_at"] {
        assert!(
            db::table_has_column(&conn, "students", column).expect("pragma"),
            "missing column {column}"
        );
    }
    let courses: i64 = conn
        .query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))
        .expect("count courses");
    assert_eq!(courses, 11);

    let store = SqliteStore::from_connection(conn, StoreOptions::default());
    let students = store
        .list_students(&StudentFilter::default())
        .expect("list migrated students");
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].name, "John Doe");
    assert_eq!(students[0].course, "Computer Science");
    assert_eq!(students[0].roll_number, None);
    assert!(!students[0].created_at.is_empty());

    let added = store
        .create_student(&NewStudent {
            roll_number: Some("CS-100".into()),
            name: "Alan Turing".into(),
            email: "alan@example.com".into(),
            course: CourseRef::ById(1),
            age: 24,
        })
        .expect("insert into migrated table");
    assert_eq!(added.course, "Computers");
    assert_eq!(added.id, 3);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn migrated_email_is_free_again_after_soft_delete() {
    let dir = temp_dir("studentd-db-migration-soft");
    let db_path = dir.join("students.sqlite3");
    write_basic_schema(&db_path);

    let store = SqliteStore::open(
        &db_path,
        StoreOptions {
            delete_mode: DeleteMode::Soft,
            unique_names: true,
        },
    )
    .expect("open migrated store");
    assert!(store.delete_student(1).expect("soft delete"));

    let again = store
        .create_student(&NewStudent {
            roll_number: None,
            name: "John Doe".into(),
            email: "john@email.com".into(),
            course: CourseRef::Named("Computer Science".into()),
            age: 21,
        })
        .expect("re-register soft-deleted email");
    assert_eq!(again.id, 3);
    assert!(store
        .create_student(&NewStudent {
            roll_number: None,
            name: "Jane Other".into(),
            email: "JANE@email.com".into(),
            course: CourseRef::Named("Mathematics".into()),
            age: 21,
        })
        .is_err());
    drop(store);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn rows_without_age_are_hidden_not_fatal() {
    let dir = temp_dir("studentd-db-migration-null-age");
    let db_path = dir.join("students.sqlite3");
    write_basic_schema(&db_path);
    {
        let conn = Connection::open(&db_path).expect("open basic db");
        conn.execute(
            "INSERT INTO students (name, email, course, age)
             VALUES ('No Age', 'noage@email.com', 'Physics', NULL)",
            [],
        )
        .expect("insert row without age");
    }

    let conn = db::open_db(&db_path).expect("open and migrate");
    let hidden: i64 = conn
        .query_row(
            "SELECT is_deleted FROM students WHERE email = 'noage@email.com'",
            [],
            |r| r.get(0),
        )
        .expect("row kept");
    assert_eq!(hidden, 1);

    let store = SqliteStore::from_connection(conn, StoreOptions::default());
    let students = store
        .list_students(&StudentFilter::default())
        .expect("list after migration");
    let names: Vec<&str> = students.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["John Doe", "Jane Smith"]);
    drop(store);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn open_db_is_idempotent() {
    let dir = temp_dir("studentd-db-reopen");
    let db_path = dir.join("nested").join("students.sqlite3");

    let conn = db::open_db(&db_path).expect("first open");
    drop(conn);
    let conn = db::open_db(&db_path).expect("second open");
    let courses: i64 = conn
        .query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))
        .expect("count courses");
    assert_eq!(courses, 11, "catalogue must not be duplicated on reopen");

    let _ = std::fs::remove_dir_all(dir);
}
