//! Student aggregate model.
//!
//! # Responsibility
//! - Define the student record and its forward enrollment references.
//! - Validate the external identity key before persistence.
//!
//! # Invariants
//! - `student_number` is unique across the directory and never reused.
//! - `enrolled_courses` is sorted ascending and duplicate-free.
//! - `user_id` points to exactly one user account; the account owns at most
//!   one student record.

use crate::model::actor::UserId;
use crate::model::course::CourseId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable internal identifier for a student record.
pub type StudentId = Uuid;

static STUDENT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,31}$").expect("valid student number regex"));

/// Student record together with its forward enrollment references.
///
/// The `enrolled_courses` list is the forward side of the student<->course
/// relationship and the ground truth the reconciler rebuilds rosters from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Stable internal ID used for linking and auditing.
    pub id: StudentId,
    /// External identity key (e.g. `S-2026-0042`), unique.
    pub student_number: String,
    /// Owning user account in the external user store.
    pub user_id: UserId,
    /// Optional parent account in the external user store.
    pub parent_id: Option<UserId>,
    /// Forward course references, sorted ascending.
    pub enrolled_courses: Vec<CourseId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Student {
    /// Returns whether this student's forward references include `course_id`.
    pub fn is_enrolled_in(&self, course_id: CourseId) -> bool {
        self.enrolled_courses.contains(&course_id)
    }
}

/// Input for creating a student record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    /// External identity key. Must match the student-number format.
    pub student_number: String,
    /// Owning user account.
    pub user_id: UserId,
    /// Optional parent account.
    pub parent_id: Option<UserId>,
}

impl NewStudent {
    /// Validates identity-key format constraints.
    pub fn validate(&self) -> Result<(), StudentValidationError> {
        if !STUDENT_NUMBER_RE.is_match(self.student_number.as_str()) {
            return Err(StudentValidationError::InvalidStudentNumber(
                self.student_number.clone(),
            ));
        }
        Ok(())
    }
}

/// Validation errors for student input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentValidationError {
    /// Student number is empty, too long, or contains unsupported characters.
    InvalidStudentNumber(String),
}

impl Display for StudentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStudentNumber(value) => {
                write!(
                    f,
                    "student number must be 1-32 characters of [A-Za-z0-9-] starting alphanumeric, got `{value}`"
                )
            }
        }
    }
}

impl Error for StudentValidationError {}
