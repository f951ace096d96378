//! Directory administration use-case service.
//!
//! # Responsibility
//! - Gate aggregate lifecycle operations behind the admin capability.
//! - Pass lookup operations through to the repository unchanged.
//!
//! # Invariants
//! - Create, delete and teacher assignment require `Capability::Admin`.
//! - Reads carry no capability gate; resolution for display and tooling is
//!   open to every actor.

use crate::model::actor::{Actor, Capability, UserId};
use crate::model::course::{Course, CourseId, NewCourse};
use crate::model::student::{NewStudent, Student, StudentId};
use crate::repo::directory_repo::{
    CourseCascade, DirectoryRepoError, DirectoryRepository, StudentCascade,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DirectoryServiceResult<T> = Result<T, DirectoryServiceError>;

/// Errors from directory administration use-cases.
#[derive(Debug)]
pub enum DirectoryServiceError {
    /// Actor capability does not permit directory administration.
    NotAuthorized {
        user_id: UserId,
        capability: &'static str,
    },
    /// Persistence-layer failure.
    Repo(DirectoryRepoError),
}

impl Display for DirectoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthorized {
                user_id,
                capability,
            } => write!(
                f,
                "actor {user_id} ({capability}) may not administer the directory"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DirectoryRepoError> for DirectoryServiceError {
    fn from(value: DirectoryRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Directory service facade over the directory repository.
pub struct DirectoryService<R: DirectoryRepository> {
    repo: R,
}

impl<R: DirectoryRepository> DirectoryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one student. Admin only.
    pub fn create_student(
        &self,
        actor: &Actor,
        new_student: &NewStudent,
    ) -> DirectoryServiceResult<Student> {
        require_admin(actor)?;
        Ok(self.repo.create_student(new_student)?)
    }

    /// Creates one course. Admin only.
    pub fn create_course(
        &self,
        actor: &Actor,
        new_course: &NewCourse,
    ) -> DirectoryServiceResult<Course> {
        require_admin(actor)?;
        Ok(self.repo.create_course(new_course)?)
    }

    /// Assigns or clears the teacher of a course. Admin only.
    pub fn assign_teacher(
        &self,
        actor: &Actor,
        course_id: CourseId,
        teacher_id: Option<UserId>,
    ) -> DirectoryServiceResult<()> {
        require_admin(actor)?;
        Ok(self.repo.assign_teacher(course_id, teacher_id)?)
    }

    /// Deletes one student plus all enrollment links. Admin only.
    pub fn delete_student(
        &self,
        actor: &Actor,
        id: StudentId,
    ) -> DirectoryServiceResult<StudentCascade> {
        require_admin(actor)?;
        Ok(self.repo.delete_student(id)?)
    }

    /// Deletes one course plus all enrollment links. Admin only.
    pub fn delete_course(
        &self,
        actor: &Actor,
        id: CourseId,
    ) -> DirectoryServiceResult<CourseCascade> {
        require_admin(actor)?;
        Ok(self.repo.delete_course(id)?)
    }

    /// Loads one student, or `None`.
    pub fn get_student(&self, id: StudentId) -> DirectoryServiceResult<Option<Student>> {
        Ok(self.repo.get_student(id)?)
    }

    /// Loads one course, or `None`.
    pub fn get_course(&self, id: CourseId) -> DirectoryServiceResult<Option<Course>> {
        Ok(self.repo.get_course(id)?)
    }

    /// Looks a student up by unique student number.
    pub fn find_student_by_number(
        &self,
        student_number: &str,
    ) -> DirectoryServiceResult<Option<Student>> {
        Ok(self.repo.find_student_by_number(student_number)?)
    }

    /// Looks a course up by unique code.
    pub fn find_course_by_code(&self, code: &str) -> DirectoryServiceResult<Option<Course>> {
        Ok(self.repo.find_course_by_code(code)?)
    }

    /// Lists course ids taught by one teacher.
    pub fn courses_owned_by(&self, teacher_id: UserId) -> DirectoryServiceResult<Vec<CourseId>> {
        Ok(self.repo.courses_owned_by(teacher_id)?)
    }
}

fn require_admin(actor: &Actor) -> DirectoryServiceResult<()> {
    match &actor.capability {
        Capability::Admin => Ok(()),
        capability => Err(DirectoryServiceError::NotAuthorized {
            user_id: actor.user_id,
            capability: capability.label(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{require_admin, DirectoryServiceError};
    use crate::model::actor::Actor;
    use uuid::Uuid;

    #[test]
    fn admin_passes_directory_gate() {
        assert!(require_admin(&Actor::admin(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn non_admin_capabilities_are_denied() {
        let actors = [
            Actor::teacher(Uuid::new_v4(), [Uuid::new_v4()]),
            Actor::student(Uuid::new_v4()),
            Actor::parent(Uuid::new_v4()),
        ];
        for actor in actors {
            let err = require_admin(&actor).expect_err("gate should deny");
            assert!(matches!(err, DirectoryServiceError::NotAuthorized { .. }));
        }
    }
}
