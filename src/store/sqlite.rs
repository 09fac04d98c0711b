//! SQLite student store.
//!
//! One connection behind a `Mutex`. Every write runs in its own transaction so
//! the duplicate pre-check and the insert/update see the same snapshot.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use tracing::debug;

use super::{
    find_duplicate, DeleteMode, DuplicateField, StoreError, StoreKind, StoreOptions, StoreResult,
    StudentStore,
};
use crate::db;
use crate::model::{Course, CourseRef, NewStudent, Student, StudentFilter};

const SELECT_STUDENT: &str = "SELECT s.id, s.roll_number, s.name, s.email,
        COALESCE(c.course_name, s.course, ''), s.course_id, s.age, s.created_at, s.updated_at
     FROM students s
     LEFT JOIN courses c ON c.id = s.course_id";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

fn row_to_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    let created_at: Option<String> = row.get(7)?;
    Ok(Student {
        id: row.get(0)?,
        roll_number: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        course: row.get(4)?,
        course_id: row.get(5)?,
        age: row.get(6)?,
        created_at: created_at.unwrap_or_default(),
        updated_at: row.get(8)?,
    })
}

/// Unique-index violations that slip past the pre-check become duplicates.
fn map_write_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(f, Some(msg)) = &e {
        if f.code == ErrorCode::ConstraintViolation && msg.contains("UNIQUE") {
            let field = if msg.contains("roll_number") {
                DuplicateField::RollNumber
            } else {
                DuplicateField::Email
            };
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Db(e)
}

impl SqliteStore {
    pub fn open(path: &Path, options: StoreOptions) -> anyhow::Result<Self> {
        let conn = db::open_db(path)?;
        Ok(Self::from_connection(conn, options))
    }

    /// Wraps a connection already prepared by [`db::open_db`].
    pub fn from_connection(conn: Connection, options: StoreOptions) -> Self {
        Self {
            conn: Mutex::new(conn),
            options,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<Student>> {
        let sql = format!("{SELECT_STUDENT} WHERE s.id = ? AND s.is_deleted = 0");
        Ok(conn.query_row(&sql, [id], row_to_student).optional()?)
    }

    fn check_duplicates(
        &self,
        tx: &Transaction<'_>,
        input: &NewStudent,
        exclude: Option<i64>,
    ) -> StoreResult<()> {
        let mut stmt = tx.prepare(
            "SELECT email, name, roll_number FROM students
             WHERE is_deleted = 0 AND id != ?",
        )?;
        let others = stmt
            .query_map([exclude.unwrap_or(-1)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let view = others
            .iter()
            .map(|(e, n, r)| (e.as_str(), n.as_str(), r.as_deref()));
        match find_duplicate(input, self.options.unique_names, view) {
            Some(field) => Err(StoreError::Duplicate { field }),
            None => Ok(()),
        }
    }

    fn resolve_course(tx: &Transaction<'_>, course: &CourseRef) -> StoreResult<(String, Option<i64>)> {
        match course {
            CourseRef::Named(name) => Ok((name.clone(), None)),
            CourseRef::ById(id) => {
                let name: Option<String> = tx
                    .query_row("SELECT course_name FROM courses WHERE id = ?", [id], |r| {
                        r.get(0)
                    })
                    .optional()?;
                name.map(|n| (n, Some(*id)))
                    .ok_or(StoreError::UnknownCourse(*id))
            }
        }
    }
}

impl StudentStore for SqliteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Sqlite
    }

    fn options(&self) -> StoreOptions {
        self.options
    }

    fn list_students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_STUDENT} WHERE s.is_deleted = 0 ORDER BY s.id");
        let mut stmt = conn.prepare(&sql)?;
        let students = stmt
            .query_map([], row_to_student)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students.into_iter().filter(|s| filter.matches(s)).collect())
    }

    fn get_student(&self, id: i64) -> StoreResult<Option<Student>> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn create_student(&self, input: &NewStudent) -> StoreResult<Student> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        self.check_duplicates(&tx, input, None)?;
        let (course, course_id) = Self::resolve_course(&tx, &input.course)?;

        tx.execute(
            "INSERT INTO students(
               roll_number,
               name,
               email,
               course,
               course_id,
               age,
               is_deleted,
               created_at
             ) VALUES(?, ?, ?, ?, ?, ?, 0, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            params![
                input.roll_number.as_deref(),
                &input.name,
                &input.email,
                &course,
                course_id,
                input.age,
            ],
        )
        .map_err(map_write_err)?;
        let id = tx.last_insert_rowid();
        let student = Self::fetch(&tx, id)?;
        tx.commit()?;
        debug!(student_id = id, "student created");
        // The row was inserted in this transaction, so it is always present.
        student.ok_or(StoreError::Db(rusqlite::Error::QueryReturnedNoRows))
    }

    fn update_student(&self, id: i64, input: &NewStudent) -> StoreResult<Option<Student>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        if Self::fetch(&tx, id)?.is_none() {
            return Ok(None);
        }
        self.check_duplicates(&tx, input, Some(id))?;
        let (course, course_id) = Self::resolve_course(&tx, &input.course)?;

        let changed = tx
            .execute(
                "UPDATE students
                 SET roll_number = ?, name = ?, email = ?, course = ?, course_id = ?, age = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ? AND is_deleted = 0",
                params![
                    input.roll_number.as_deref(),
                    &input.name,
                    &input.email,
                    &course,
                    course_id,
                    input.age,
                    id,
                ],
            )
            .map_err(map_write_err)?;
        if changed == 0 {
            return Ok(None);
        }
        let student = Self::fetch(&tx, id)?;
        tx.commit()?;
        debug!(student_id = id, "student updated");
        Ok(student)
    }

    fn delete_student(&self, id: i64) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = match self.options.delete_mode {
            DeleteMode::Hard => conn.execute(
                "DELETE FROM students WHERE id = ? AND is_deleted = 0",
                [id],
            )?,
            DeleteMode::Soft => conn.execute(
                "UPDATE students
                 SET is_deleted = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ? AND is_deleted = 0",
                [id],
            )?,
        };
        if changed > 0 {
            debug!(student_id = id, mode = ?self.options.delete_mode, "student deleted");
        }
        Ok(changed > 0)
    }

    fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, course_name FROM courses ORDER BY course_name")?;
        let courses = stmt
            .query_map([], |row| {
                Ok(Course {
                    id: row.get(0)?,
                    course_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }
}
