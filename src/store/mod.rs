//! Storage backends for students and courses.
//!
//! Both backends implement [`StudentStore`] with the same duplicate and
//! delete semantics, so the HTTP layer never needs to know which one it is
//! talking to.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Course, CourseRef, NewStudent, Student, StudentFilter};

pub const DEFAULT_COURSES: &[&str] = &[
    "Computers",
    "Mathematics",
    "Science",
    "ECE",
    "EEE",
    "Mechanical",
    "Artificial Intelligence",
    "Data Science",
    "Machine Learning",
    "Cyber Security",
    "Block Chain",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Sqlite,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Memory => f.write_str("memory"),
            StoreKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    #[default]
    Hard,
    /// Rows are flagged `is_deleted` and hidden from every read.
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub delete_mode: DeleteMode,
    pub unique_names: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            delete_mode: DeleteMode::Hard,
            unique_names: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Name,
    RollNumber,
}

impl DuplicateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateField::Email => "email",
            DuplicateField::Name => "name",
            DuplicateField::RollNumber => "roll number",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Student with this {} already exists", .field.as_str())]
    Duplicate { field: DuplicateField },
    #[error("course {0} not found")]
    UnknownCourse(i64),
    #[error("store lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait StudentStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    fn options(&self) -> StoreOptions;

    fn list_students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>>;

    fn get_student(&self, id: i64) -> StoreResult<Option<Student>>;

    fn create_student(&self, input: &NewStudent) -> StoreResult<Student>;

    /// Replaces every mutable field. `Ok(None)` when no live student has `id`.
    fn update_student(&self, id: i64, input: &NewStudent) -> StoreResult<Option<Student>>;

    /// `Ok(false)` when no live student has `id`.
    fn delete_student(&self, id: i64) -> StoreResult<bool>;

    fn list_courses(&self) -> StoreResult<Vec<Course>>;
}

pub fn sample_students() -> Vec<NewStudent> {
    vec![
        NewStudent {
            roll_number: None,
            name: "John Doe".into(),
            email: "john@email.com".into(),
            course: CourseRef::Named("Computer Science".into()),
            age: 20,
        },
        NewStudent {
            roll_number: None,
            name: "Jane Smith".into(),
            email: "jane@email.com".into(),
            course: CourseRef::Named("Mathematics".into()),
            age: 22,
        },
    ]
}

/// Inserts the sample students when the store has none. Returns how many
/// were added.
pub fn seed_sample_students(store: &dyn StudentStore) -> StoreResult<usize> {
    if !store.list_students(&StudentFilter::default())?.is_empty() {
        return Ok(0);
    }
    let samples = sample_students();
    for s in &samples {
        store.create_student(s)?;
    }
    Ok(samples.len())
}

/// Live-row duplicate check shared by both backends. `others` yields
/// `(email, name, roll_number)` of every live student except the one being
/// updated.
pub(crate) fn find_duplicate<'a, I>(
    input: &NewStudent,
    unique_names: bool,
    others: I,
) -> Option<DuplicateField>
where
    I: IntoIterator<Item = (&'a str, &'a str, Option<&'a str>)>,
{
    for (email, name, roll) in others {
        if email.eq_ignore_ascii_case(&input.email) {
            return Some(DuplicateField::Email);
        }
        if unique_names && name.to_lowercase() == input.name.to_lowercase() {
            return Some(DuplicateField::Name);
        }
        if let (Some(a), Some(b)) = (roll, input.roll_number.as_deref()) {
            if a.to_lowercase() == b.to_lowercase() {
                return Some(DuplicateField::RollNumber);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, email: &str, roll: Option<&str>) -> NewStudent {
        NewStudent {
            roll_number: roll.map(str::to_string),
            name: name.into(),
            email: email.into(),
            course: CourseRef::Named("Science".into()),
            age: 20,
        }
    }

    #[test]
    fn duplicate_check_is_case_insensitive() {
        let existing = [("john@email.com", "John Doe", Some("R-001"))];
        assert_eq!(
            find_duplicate(&input("Other", "JOHN@email.com", None), true, existing),
            Some(DuplicateField::Email)
        );
        assert_eq!(
            find_duplicate(&input("john doe", "new@email.com", None), true, existing),
            Some(DuplicateField::Name)
        );
        assert_eq!(
            find_duplicate(&input("john doe", "new@email.com", None), false, existing),
            None
        );
        assert_eq!(
            find_duplicate(&input("Other", "new@email.com", Some("r-001")), true, existing),
            Some(DuplicateField::RollNumber)
        );
    }

    #[test]
    fn duplicate_message_names_the_field() {
        let e = StoreError::Duplicate {
            field: DuplicateField::RollNumber,
        };
        assert_eq!(e.to_string(), "Student with this roll number already exists");
    }
}
