use rusqlite::Connection;
use std::path::Path;
use tracing::warn;

use crate::store::DEFAULT_COURSES;

const STUDENTS_COLUMNS: &str = "
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    roll_number TEXT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    course TEXT,
    course_id INTEGER,
    age INTEGER NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    FOREIGN KEY(course_id) REFERENCES courses(id)";

pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    let in_memory = path.as_os_str() == ":memory:";
    if !in_memory {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = if in_memory {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    {
        let mut stmt = conn.prepare("INSERT OR IGNORE INTO courses(course_name) VALUES(?)")?;
        for name in DEFAULT_COURSES {
            stmt.execute([name])?;
        }
    }

    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS students({STUDENTS_COLUMNS})"),
        [],
    )?;

    // Databases written by the plain name/email/course/age service predate
    // these columns. Add them in place.
    ensure_students_roll_number(&conn)?;
    ensure_students_course_id(&conn)?;
    ensure_students_is_deleted(&conn)?;
    ensure_students_timestamps(&conn)?;
    ensure_students_live_constraints(&conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_is_deleted ON students(is_deleted)",
        [],
    )?;
    // Uniqueness applies to live rows only, so a soft-deleted student does not
    // block re-registering the same email or roll number.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_live_email
         ON students(lower(email)) WHERE is_deleted = 0",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_live_roll_number
         ON students(lower(roll_number)) WHERE is_deleted = 0 AND roll_number IS NOT NULL",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_roll_number(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "roll_number")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN roll_number TEXT", [])?;
    Ok(())
}

fn ensure_students_course_id(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "students", "course")? {
        conn.execute("ALTER TABLE students ADD COLUMN course TEXT", [])?;
    }
    if !table_has_column(conn, "students", "course_id")? {
        conn.execute(
            "ALTER TABLE students ADD COLUMN course_id INTEGER REFERENCES courses(id)",
            [],
        )?;
    }
    Ok(())
}

fn ensure_students_is_deleted(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "is_deleted")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_students_timestamps(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "students", "created_at")? {
        conn.execute("ALTER TABLE students ADD COLUMN created_at TEXT", [])?;
        // Rows from before this column existed get the migration time.
        conn.execute(
            "UPDATE students SET created_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE created_at IS NULL",
            [],
        )?;
    }
    if !table_has_column(conn, "students", "updated_at")? {
        conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    }
    Ok(())
}

/// The old layout declared `email UNIQUE` over every row and let `age` be
/// NULL. Both clash with soft delete and the row reader, and SQLite cannot
/// drop a column constraint, so the table is rebuilt. Rows without an age are
/// kept but hidden.
fn ensure_students_live_constraints(conn: &Connection) -> anyhow::Result<()> {
    let email_unique = column_has_unique_constraint(conn, "students", "email")?;
    let age_nullable = !column_is_not_null(conn, "students", "age")?;
    if !email_unique && !age_nullable {
        return Ok(());
    }

    let hidden: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE age IS NULL AND is_deleted = 0",
        [],
        |r| r.get(0),
    )?;
    if hidden > 0 {
        warn!(hidden, "students without an age are hidden by the migration");
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE students_rebuild({STUDENTS_COLUMNS});
         INSERT INTO students_rebuild(
            id, roll_number, name, email, course, course_id, age, is_deleted,
            created_at, updated_at)
         SELECT id, roll_number, name, email, course, course_id, COALESCE(age, 0),
            CASE WHEN age IS NULL THEN 1 ELSE is_deleted END,
            created_at, updated_at
         FROM students;
         DROP TABLE students;
         ALTER TABLE students_rebuild RENAME TO students;"
    ))?;
    tx.commit()?;
    Ok(())
}

/// True when a UNIQUE column or table constraint covers exactly `column`.
fn column_has_unique_constraint(
    conn: &Connection,
    table: &str,
    column: &str,
) -> anyhow::Result<bool> {
    let mut constraints = Vec::new();
    {
        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", table))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let unique: i64 = row.get(2)?;
            let origin: String = row.get(3)?;
            if unique == 1 && origin == "u" {
                constraints.push(name);
            }
        }
    }
    for index in constraints {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info('{}')", index))?;
        let columns = stmt
            .query_map([], |r| r.get::<_, Option<String>>(2))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns == [Some(column.to_string())] {
            return Ok(true);
        }
    }
    Ok(false)
}

fn column_is_not_null(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            let not_null: i64 = row.get(3)?;
            return Ok(not_null != 0);
        }
    }
    Ok(false)
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
