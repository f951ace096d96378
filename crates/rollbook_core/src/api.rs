//! Transport-agnostic enrollment endpoint contract.
//!
//! # Responsibility
//! - Parse and validate wire payloads before any store access.
//! - Map service results onto status codes and reply bodies.
//!
//! # Invariants
//! - Validation failures reject with 400 and never touch the store.
//! - Drift repair is invisible on the wire; a healed call replies like a
//!   plain success.
//! - Store failures reply 500 with a generic body; detail goes to the log.

use crate::model::actor::Actor;
use crate::model::course::CourseId;
use crate::model::student::StudentId;
use crate::repo::roster_repo::RosterRepository;
use crate::service::enrollment_service::{
    CourseSummary, EnrollmentError, EnrollmentOutcome, EnrollmentService, OutcomeStatus,
    StudentSummary,
};
use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire payload of `POST /enrollments/enroll` and `/enrollments/unenroll`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrollmentRequest {
    pub student_id: Option<String>,
    pub course_id: Option<String>,
}

/// Success body: message plus both aggregates after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentReply {
    pub message: String,
    pub student: StudentSummary,
    pub course: CourseSummary,
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Reply body, success or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ApiBody {
    Enrollment(EnrollmentReply),
    Error(ErrorReply),
}

/// Status code plus body, ready for any HTTP host to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiReply {
    fn enrollment(message: &str, outcome: EnrollmentOutcome) -> Self {
        Self {
            status: 200,
            body: ApiBody::Enrollment(EnrollmentReply {
                message: message.to_string(),
                student: outcome.student,
                course: outcome.course,
            }),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiBody::Error(ErrorReply {
                error: message.into(),
            }),
        }
    }
}

/// Handles `POST /enrollments/enroll`.
pub fn handle_enroll<R: RosterRepository>(
    service: &EnrollmentService<R>,
    actor: &Actor,
    request: &EnrollmentRequest,
) -> ApiReply {
    let (student_id, course_id) = match parse_request(request) {
        Ok(ids) => ids,
        Err(message) => return ApiReply::error(400, message),
    };
    match service.enroll(actor, student_id, course_id) {
        Ok(outcome) => ApiReply::enrollment(enroll_message(outcome.status), outcome),
        Err(err) => error_reply("enroll", &err),
    }
}

/// Handles `POST /enrollments/unenroll`.
pub fn handle_unenroll<R: RosterRepository>(
    service: &EnrollmentService<R>,
    actor: &Actor,
    request: &EnrollmentRequest,
) -> ApiReply {
    let (student_id, course_id) = match parse_request(request) {
        Ok(ids) => ids,
        Err(message) => return ApiReply::error(400, message),
    };
    match service.unenroll(actor, student_id, course_id) {
        Ok(outcome) => ApiReply::enrollment(unenroll_message(outcome.status), outcome),
        Err(err) => error_reply("unenroll", &err),
    }
}

fn parse_request(request: &EnrollmentRequest) -> Result<(StudentId, CourseId), String> {
    let student_raw = request
        .student_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if student_raw.is_empty() {
        return Err("studentId is required".to_string());
    }
    let course_raw = request
        .course_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if course_raw.is_empty() {
        return Err("courseId is required".to_string());
    }

    let student_id =
        Uuid::parse_str(student_raw).map_err(|_| "studentId is not a valid id".to_string())?;
    let course_id =
        Uuid::parse_str(course_raw).map_err(|_| "courseId is not a valid id".to_string())?;
    Ok((student_id, course_id))
}

fn enroll_message(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::AlreadyConsistent => "Student is already enrolled in this course",
        OutcomeStatus::Applied | OutcomeStatus::RepairedDrift => "Student enrolled successfully",
    }
}

fn unenroll_message(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::AlreadyConsistent => "Student is not enrolled in this course",
        OutcomeStatus::Applied | OutcomeStatus::RepairedDrift => "Student unenrolled successfully",
    }
}

fn error_reply(op: &str, err: &EnrollmentError) -> ApiReply {
    match err {
        EnrollmentError::StudentNotFound(_) => ApiReply::error(404, "Student not found"),
        EnrollmentError::CourseNotFound(_) => ApiReply::error(404, "Course not found"),
        EnrollmentError::NotAuthorized { .. } => {
            ApiReply::error(403, "You are not allowed to modify this course roster")
        }
        EnrollmentError::Store(_) | EnrollmentError::InconsistentState(_) => {
            error!(
                "event=enrollment_api module=api status=error op={op} \
                 error_code=store_failure error={err}"
            );
            ApiReply::error(500, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_request, EnrollmentRequest};
    use uuid::Uuid;

    fn request(student_id: Option<&str>, course_id: Option<&str>) -> EnrollmentRequest {
        EnrollmentRequest {
            student_id: student_id.map(str::to_string),
            course_id: course_id.map(str::to_string),
        }
    }

    #[test]
    fn missing_student_id_is_rejected_first() {
        let err = parse_request(&request(None, None)).expect_err("should reject");
        assert_eq!(err, "studentId is required");
    }

    #[test]
    fn blank_course_id_counts_as_missing() {
        let student = Uuid::new_v4().to_string();
        let err = parse_request(&request(Some(student.as_str()), Some("   ")))
            .expect_err("should reject");
        assert_eq!(err, "courseId is required");
    }

    #[test]
    fn malformed_ids_are_rejected_before_any_lookup() {
        let valid = Uuid::new_v4().to_string();
        let err = parse_request(&request(Some("not-a-uuid"), Some(valid.as_str())))
            .expect_err("should reject");
        assert_eq!(err, "studentId is not a valid id");

        let err = parse_request(&request(Some(valid.as_str()), Some("also-bad")))
            .expect_err("should reject");
        assert_eq!(err, "courseId is not a valid id");
    }

    #[test]
    fn well_formed_ids_parse_with_surrounding_whitespace() {
        let student = Uuid::new_v4();
        let course = Uuid::new_v4();
        let padded_student = format!("  {student}  ");
        let padded_course = course.to_string();
        let parsed = parse_request(&request(
            Some(padded_student.as_str()),
            Some(padded_course.as_str()),
        ))
        .expect("should parse");
        assert_eq!(parsed, (student, course));
    }
}
