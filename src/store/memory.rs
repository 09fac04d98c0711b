//! In-memory student store.
//!
//! All state lives behind one `RwLock` and is lost on restart.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::{
    find_duplicate, DeleteMode, StoreError, StoreKind, StoreOptions, StoreResult, StudentStore,
    DEFAULT_COURSES,
};
use crate::model::{Course, CourseRef, NewStudent, Student, StudentFilter};

#[derive(Debug, Clone)]
struct StoredStudent {
    student: Student,
    deleted: bool,
}

#[derive(Debug)]
struct Inner {
    next_id: i64,
    students: BTreeMap<i64, StoredStudent>,
    courses: Vec<Course>,
}

impl Inner {
    fn live(&self) -> impl Iterator<Item = &Student> {
        self.students
            .values()
            .filter(|s| !s.deleted)
            .map(|s| &s.student)
    }

    fn resolve_course(&self, course: &CourseRef) -> StoreResult<(String, Option<i64>)> {
        match course {
            CourseRef::Named(name) => Ok((name.clone(), None)),
            CourseRef::ById(id) => self
                .courses
                .iter()
                .find(|c| c.id == *id)
                .map(|c| (c.course_name.clone(), Some(c.id)))
                .ok_or(StoreError::UnknownCourse(*id)),
        }
    }

    fn check_duplicates(
        &self,
        input: &NewStudent,
        unique_names: bool,
        exclude: Option<i64>,
    ) -> StoreResult<()> {
        let others = self
            .live()
            .filter(|s| Some(s.id) != exclude)
            .map(|s| (s.email.as_str(), s.name.as_str(), s.roll_number.as_deref()));
        match find_duplicate(input, unique_names, others) {
            Some(field) => Err(StoreError::Duplicate { field }),
            None => Ok(()),
        }
    }
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    options: StoreOptions,
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl MemoryStore {
    pub fn new(options: StoreOptions) -> Self {
        let courses = DEFAULT_COURSES
            .iter()
            .enumerate()
            .map(|(i, name)| Course {
                id: i as i64 + 1,
                course_name: (*name).to_string(),
            })
            .collect();
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                students: BTreeMap::new(),
                courses,
            }),
            options,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl StudentStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn options(&self) -> StoreOptions {
        self.options
    }

    fn list_students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        let inner = self.read()?;
        let students = inner.live().filter(|s| filter.matches(s)).cloned().collect();
        Ok(students)
    }

    fn get_student(&self, id: i64) -> StoreResult<Option<Student>> {
        let inner = self.read()?;
        let found = inner.live().find(|s| s.id == id).cloned();
        Ok(found)
    }

    fn create_student(&self, input: &NewStudent) -> StoreResult<Student> {
        // Check and insert under the same guard.
        let mut inner = self.write()?;
        inner.check_duplicates(input, self.options.unique_names, None)?;
        let (course, course_id) = inner.resolve_course(&input.course)?;

        let id = inner.next_id;
        inner.next_id += 1;
        let student = Student {
            id,
            roll_number: input.roll_number.clone(),
            name: input.name.clone(),
            email: input.email.clone(),
            course,
            course_id,
            age: input.age,
            created_at: now(),
            updated_at: None,
        };
        inner.students.insert(
            id,
            StoredStudent {
                student: student.clone(),
                deleted: false,
            },
        );
        debug!(student_id = id, "student created");
        Ok(student)
    }

    fn update_student(&self, id: i64, input: &NewStudent) -> StoreResult<Option<Student>> {
        let mut inner = self.write()?;
        if inner.live().all(|s| s.id != id) {
            return Ok(None);
        }
        inner.check_duplicates(input, self.options.unique_names, Some(id))?;
        let (course, course_id) = inner.resolve_course(&input.course)?;

        let Some(stored) = inner.students.get_mut(&id) else {
            return Ok(None);
        };
        let s = &mut stored.student;
        s.roll_number = input.roll_number.clone();
        s.name = input.name.clone();
        s.email = input.email.clone();
        s.course = course;
        s.course_id = course_id;
        s.age = input.age;
        s.updated_at = Some(now());
        debug!(student_id = id, "student updated");
        Ok(Some(s.clone()))
    }

    fn delete_student(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.write()?;
        if !inner.students.get(&id).is_some_and(|s| !s.deleted) {
            return Ok(false);
        }
        match self.options.delete_mode {
            DeleteMode::Hard => {
                inner.students.remove(&id);
            }
            DeleteMode::Soft => {
                if let Some(s) = inner.students.get_mut(&id) {
                    s.deleted = true;
                }
            }
        }
        debug!(student_id = id, mode = ?self.options.delete_mode, "student deleted");
        Ok(true)
    }

    fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let inner = self.read()?;
        let mut courses = inner.courses.clone();
        courses.sort_by(|a, b| a.course_name.cmp(&b.course_name));
        Ok(courses)
    }
}
