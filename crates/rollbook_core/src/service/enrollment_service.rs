//! Enrollment use-case service.
//!
//! # Responsibility
//! - Resolve both aggregates, authorize the actor, then converge the two
//!   enrollment sides toward the requested membership state.
//! - Report which sides were actually written so callers can audit repairs.
//!
//! # Invariants
//! - Lookup failures surface before authorization failures.
//! - A side that already holds the requested state is never rewritten.
//! - One-sided state is logged as drift and healed by writing the missing
//!   side only.

use crate::model::actor::{Actor, Capability, UserId};
use crate::model::course::{Course, CourseId};
use crate::model::student::{Student, StudentId};
use crate::repo::roster_repo::{RosterRepoError, RosterRepository};
use log::warn;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EnrollmentResult<T> = Result<T, EnrollmentError>;

/// Errors from enrollment use-cases.
#[derive(Debug)]
pub enum EnrollmentError {
    /// Target student does not exist.
    StudentNotFound(StudentId),
    /// Target course does not exist.
    CourseNotFound(CourseId),
    /// Actor capability does not permit writing this course roster.
    NotAuthorized {
        user_id: UserId,
        capability: &'static str,
        course_id: CourseId,
    },
    /// Persistence-layer failure.
    Store(RosterRepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for EnrollmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::NotAuthorized {
                user_id,
                capability,
                course_id,
            } => write!(
                f,
                "actor {user_id} ({capability}) may not modify roster of course {course_id}"
            ),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent enrollment state: {details}")
            }
        }
    }
}

impl Error for EnrollmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RosterRepoError> for EnrollmentError {
    fn from(value: RosterRepoError) -> Self {
        Self::Store(value)
    }
}

/// Convergence outcome of one enroll/unenroll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Both sides already held the requested state; nothing written.
    AlreadyConsistent,
    /// Both sides were missing the requested state; both written.
    Applied,
    /// Exactly one side was out of line; the missing side was written.
    RepairedDrift,
}

/// Which relationship sides a call actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SideWrites {
    /// `student_enrollments` row written.
    pub student_side: bool,
    /// `course_rosters` row written.
    pub course_side: bool,
}

impl SideWrites {
    /// Number of link rows written by the call.
    pub fn total(self) -> u8 {
        u8::from(self.student_side) + u8::from(self.course_side)
    }
}

/// Student projection returned to transports after a roster write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: StudentId,
    pub student_number: String,
    pub enrolled_courses: Vec<CourseId>,
}

impl From<&Student> for StudentSummary {
    fn from(value: &Student) -> Self {
        Self {
            id: value.id,
            student_number: value.student_number.clone(),
            enrolled_courses: value.enrolled_courses.clone(),
        }
    }
}

/// Course projection returned to transports after a roster write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub students: Vec<StudentId>,
}

impl From<&Course> for CourseSummary {
    fn from(value: &Course) -> Self {
        Self {
            id: value.id,
            code: value.code.clone(),
            name: value.name.clone(),
            students: value.students.clone(),
        }
    }
}

/// Full result envelope for one enroll/unenroll call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentOutcome {
    pub status: OutcomeStatus,
    pub writes: SideWrites,
    pub student: StudentSummary,
    pub course: CourseSummary,
}

/// Checks whether `actor` may modify the roster of `course`.
///
/// Admins may write any roster; teachers only rosters of courses they own;
/// students and parents never write rosters.
pub fn authorize_roster_write(actor: &Actor, course: &Course) -> EnrollmentResult<()> {
    match &actor.capability {
        Capability::Admin => Ok(()),
        Capability::Teacher { owned_courses } if owned_courses.contains(&course.id) => Ok(()),
        capability => Err(EnrollmentError::NotAuthorized {
            user_id: actor.user_id,
            capability: capability.label(),
            course_id: course.id,
        }),
    }
}

/// Enrollment service facade over the link store.
pub struct EnrollmentService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> EnrollmentService<R> {
    /// Creates a service using the provided store implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Enrolls one student in one course, healing one-sided state on the way.
    pub fn enroll(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
    ) -> EnrollmentResult<EnrollmentOutcome> {
        let student = self
            .repo
            .find_student(student_id)?
            .ok_or(EnrollmentError::StudentNotFound(student_id))?;
        let course = self
            .repo
            .find_course(course_id)?
            .ok_or(EnrollmentError::CourseNotFound(course_id))?;
        authorize_roster_write(actor, &course)?;

        let forward_present = student.is_enrolled_in(course_id);
        let reverse_present = course.has_student(student_id);
        if forward_present != reverse_present {
            warn!(
                "event=enrollment_drift module=service status=warn op=enroll \
                 student={student_id} course={course_id} \
                 forward={forward_present} reverse={reverse_present}"
            );
        }

        let mut writes = SideWrites::default();
        if !forward_present {
            writes.student_side = self.repo.add_course_to_student(student_id, course_id)?;
        }
        if !reverse_present {
            writes.course_side = self.repo.add_student_to_course(course_id, student_id)?;
        }

        let status = convergence_status(forward_present, reverse_present, true);
        self.outcome(status, writes, student_id, course_id)
    }

    /// Removes one student from one course, healing one-sided state on the way.
    pub fn unenroll(
        &self,
        actor: &Actor,
        student_id: StudentId,
        course_id: CourseId,
    ) -> EnrollmentResult<EnrollmentOutcome> {
        let student = self
            .repo
            .find_student(student_id)?
            .ok_or(EnrollmentError::StudentNotFound(student_id))?;
        let course = self
            .repo
            .find_course(course_id)?
            .ok_or(EnrollmentError::CourseNotFound(course_id))?;
        authorize_roster_write(actor, &course)?;

        let forward_present = student.is_enrolled_in(course_id);
        let reverse_present = course.has_student(student_id);
        if forward_present != reverse_present {
            warn!(
                "event=enrollment_drift module=service status=warn op=unenroll \
                 student={student_id} course={course_id} \
                 forward={forward_present} reverse={reverse_present}"
            );
        }

        let mut writes = SideWrites::default();
        if forward_present {
            writes.student_side = self.repo.remove_course_from_student(student_id, course_id)?;
        }
        if reverse_present {
            writes.course_side = self.repo.remove_student_from_course(course_id, student_id)?;
        }

        let status = convergence_status(forward_present, reverse_present, false);
        self.outcome(status, writes, student_id, course_id)
    }

    fn outcome(
        &self,
        status: OutcomeStatus,
        writes: SideWrites,
        student_id: StudentId,
        course_id: CourseId,
    ) -> EnrollmentResult<EnrollmentOutcome> {
        let student = self
            .repo
            .find_student(student_id)?
            .ok_or(EnrollmentError::InconsistentState(
                "student missing in post-write read-back",
            ))?;
        let course = self
            .repo
            .find_course(course_id)?
            .ok_or(EnrollmentError::InconsistentState(
                "course missing in post-write read-back",
            ))?;
        Ok(EnrollmentOutcome {
            status,
            writes,
            student: StudentSummary::from(&student),
            course: CourseSummary::from(&course),
        })
    }
}

fn convergence_status(
    forward_present: bool,
    reverse_present: bool,
    desired_present: bool,
) -> OutcomeStatus {
    if forward_present != reverse_present {
        return OutcomeStatus::RepairedDrift;
    }
    if forward_present == desired_present {
        OutcomeStatus::AlreadyConsistent
    } else {
        OutcomeStatus::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::{authorize_roster_write, convergence_status, EnrollmentError, OutcomeStatus};
    use crate::model::actor::Actor;
    use crate::model::course::Course;
    use uuid::Uuid;

    fn course_with_id(id: Uuid) -> Course {
        Course {
            id,
            code: "MATH101".to_string(),
            name: "Mathematics 101".to_string(),
            teacher_id: None,
            students: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn admin_may_write_any_roster() {
        let course = course_with_id(Uuid::new_v4());
        let actor = Actor::admin(Uuid::new_v4());
        assert!(authorize_roster_write(&actor, &course).is_ok());
    }

    #[test]
    fn teacher_may_write_owned_roster_only() {
        let owned = Uuid::new_v4();
        let other = Uuid::new_v4();
        let actor = Actor::teacher(Uuid::new_v4(), [owned]);

        assert!(authorize_roster_write(&actor, &course_with_id(owned)).is_ok());
        let err = authorize_roster_write(&actor, &course_with_id(other))
            .expect_err("unowned course should be denied");
        assert!(matches!(
            err,
            EnrollmentError::NotAuthorized { capability: "teacher", .. }
        ));
    }

    #[test]
    fn student_and_parent_never_write_rosters() {
        let course = course_with_id(Uuid::new_v4());
        for actor in [Actor::student(Uuid::new_v4()), Actor::parent(Uuid::new_v4())] {
            let err = authorize_roster_write(&actor, &course)
                .expect_err("non-staff actor should be denied");
            assert!(matches!(err, EnrollmentError::NotAuthorized { .. }));
        }
    }

    #[test]
    fn convergence_status_covers_all_side_combinations() {
        assert_eq!(
            convergence_status(true, true, true),
            OutcomeStatus::AlreadyConsistent
        );
        assert_eq!(convergence_status(false, false, true), OutcomeStatus::Applied);
        assert_eq!(
            convergence_status(true, false, true),
            OutcomeStatus::RepairedDrift
        );
        assert_eq!(
            convergence_status(false, true, false),
            OutcomeStatus::RepairedDrift
        );
        assert_eq!(
            convergence_status(false, false, false),
            OutcomeStatus::AlreadyConsistent
        );
        assert_eq!(convergence_status(true, true, false), OutcomeStatus::Applied);
    }
}
