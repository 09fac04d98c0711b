use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    pub name: String,
    pub email: String,
    pub course: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    pub age: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub course_name: String,
}

/// A JSON integer that may also arrive as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    Int(i64),
    Text(String),
}

impl LooseInt {
    fn parse(&self) -> Option<i64> {
        match self {
            LooseInt::Int(v) => Some(*v),
            LooseInt::Text(s) => s.trim().parse().ok(),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, LooseInt::Text(s) if s.trim().is_empty())
    }
}

/// Body of create and update requests, as sent by the browser front end.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub course_id: Option<LooseInt>,
    #[serde(default)]
    pub age: Option<LooseInt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseRef {
    ById(i64),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub roll_number: Option<String>,
    pub name: String,
    pub email: String,
    pub course: CourseRef,
    pub age: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: i64,
    pub max: i64,
}

impl Default for AgeRange {
    fn default() -> Self {
        Self { min: 16, max: 100 }
    }
}

impl AgeRange {
    pub fn contains(&self, age: i64) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),
    #[error("Name must be at least 2 characters long")]
    NameTooShort,
    #[error("Name should not contain numbers")]
    NameHasDigits,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Roll number must be at least 3 characters long")]
    RollNumberTooShort,
    #[error("Invalid age")]
    InvalidAge,
    #[error("Student age must be between {min} and {max}")]
    AgeOutOfRange { min: i64, max: i64 },
    #[error("Invalid course id")]
    InvalidCourseId,
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl StudentPayload {
    pub fn validate(&self, ages: &AgeRange) -> Result<NewStudent, ValidationError> {
        let name = trimmed(&self.name);
        let email = trimmed(&self.email);
        let course_name = trimmed(&self.course);
        let course_id = self.course_id.as_ref().filter(|v| !v.is_blank());
        let age = self.age.as_ref().filter(|v| !v.is_blank());

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push("name");
        }
        if email.is_none() {
            missing.push("email");
        }
        // courseId wins when both are present; a bad id is reported after the
        // other field checks.
        let course = match (course_id, course_name) {
            (Some(id), _) => Some(
                id.parse()
                    .map(CourseRef::ById)
                    .ok_or(ValidationError::InvalidCourseId),
            ),
            (None, Some(n)) => Some(Ok(CourseRef::Named(n))),
            (None, None) => None,
        };
        if course.is_none() {
            missing.push("course");
        }
        if age.is_none() {
            missing.push("age");
        }
        let (Some(name), Some(email), Some(course), Some(age)) = (name, email, course, age) else {
            return Err(ValidationError::MissingFields(missing));
        };

        if name.chars().count() < 2 {
            return Err(ValidationError::NameTooShort);
        }
        if name.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::NameHasDigits);
        }
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail);
        }

        let roll_number = trimmed(&self.roll_number);
        if let Some(r) = &roll_number {
            if r.chars().count() < 3 {
                return Err(ValidationError::RollNumberTooShort);
            }
        }

        let age = age.parse().ok_or(ValidationError::InvalidAge)?;
        if !ages.contains(age) {
            return Err(ValidationError::AgeOutOfRange {
                min: ages.min,
                max: ages.max,
            });
        }

        let course = course?;

        Ok(NewStudent {
            roll_number,
            name,
            email,
            course,
            age,
        })
    }
}

/// `local@domain.tld`, no whitespace, one `@`.
fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    #[serde(default)]
    pub search: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, s: &Student) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        [
            s.roll_number.as_deref().unwrap_or(""),
            s.name.as_str(),
            s.email.as_str(),
            s.course.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
    }
}
