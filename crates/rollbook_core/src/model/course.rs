//! Course aggregate model.
//!
//! # Responsibility
//! - Define the course record and its reverse roster references.
//! - Validate course identity keys (`code`, `name`) before persistence.
//!
//! # Invariants
//! - `code` and `name` are each unique across the directory.
//! - `students` is sorted ascending and duplicate-free.
//! - At most one owning teacher per course; ownership may be unset.

use crate::model::actor::UserId;
use crate::model::student::StudentId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable internal identifier for a course record.
pub type CourseId = Uuid;

const COURSE_NAME_MAX_CHARS: usize = 120;

static COURSE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9-]{1,15}$").expect("valid course code regex"));

/// Course record together with its reverse roster references.
///
/// The `students` list is the derived side of the student<->course
/// relationship: the reconciler may reset and rebuild it at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Stable internal ID used for linking and auditing.
    pub id: CourseId,
    /// Unique course code (e.g. `MATH101`).
    pub code: String,
    /// Unique display name.
    pub name: String,
    /// Owning teacher account, if assigned.
    pub teacher_id: Option<UserId>,
    /// Reverse student references, sorted ascending.
    pub students: Vec<StudentId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Course {
    /// Returns whether this course's roster includes `student_id`.
    pub fn has_student(&self, student_id: StudentId) -> bool {
        self.students.contains(&student_id)
    }
}

/// Input for creating a course record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    /// Unique course code. Must match the course-code format.
    pub code: String,
    /// Unique display name, trimmed, non-blank.
    pub name: String,
    /// Optional owning teacher account.
    pub teacher_id: Option<UserId>,
}

impl NewCourse {
    /// Validates identity-key format constraints.
    pub fn validate(&self) -> Result<(), CourseValidationError> {
        if !COURSE_CODE_RE.is_match(self.code.as_str()) {
            return Err(CourseValidationError::InvalidCode(self.code.clone()));
        }
        let trimmed = self.name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > COURSE_NAME_MAX_CHARS {
            return Err(CourseValidationError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}

/// Validation errors for course input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseValidationError {
    /// Code is not uppercase-alphanumeric in the expected shape.
    InvalidCode(String),
    /// Name is blank after trim or longer than the allowed maximum.
    InvalidName(String),
}

impl Display for CourseValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode(value) => write!(
                f,
                "course code must be 2-16 characters of [A-Z0-9-] starting with a letter, got `{value}`"
            ),
            Self::InvalidName(value) => write!(
                f,
                "course name must be non-blank and at most {COURSE_NAME_MAX_CHARS} characters, got `{value}`"
            ),
        }
    }
}

impl Error for CourseValidationError {}
