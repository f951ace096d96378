//! Student/course directory repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own aggregate lifecycle: create, lookup, teacher assignment, delete.
//! - Keep deletes cascading: an aggregate never outlives its link rows.
//!
//! # Invariants
//! - `student_number`, `user_uuid`, course `code` and course `name` are
//!   unique; duplicates are rejected before the insert runs.
//! - Deletes remove the aggregate row and both link-table sides in one
//!   immediate transaction.

use crate::db::DbError;
use crate::model::actor::UserId;
use crate::model::course::{Course, CourseId, CourseValidationError, NewCourse};
use crate::model::student::{NewStudent, Student, StudentId, StudentValidationError};
use crate::repo::roster_repo::{
    parse_course_row, parse_student_row, RosterRepoError, RosterRepository,
    SqliteRosterRepository,
};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type DirectoryRepoResult<T> = Result<T, DirectoryRepoError>;

/// Errors from directory repository operations.
#[derive(Debug)]
pub enum DirectoryRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Link-store error raised while loading or checking shared tables.
    Roster(RosterRepoError),
    /// New student payload failed validation.
    StudentValidation(StudentValidationError),
    /// New course payload failed validation.
    CourseValidation(CourseValidationError),
    /// Another student already holds this student number.
    DuplicateStudentNumber(String),
    /// Another student is already bound to this user account.
    DuplicateUserAccount(UserId),
    /// Another course already holds this code.
    DuplicateCourseCode(String),
    /// Another course already holds this name.
    DuplicateCourseName(String),
    /// Target student does not exist.
    StudentNotFound(StudentId),
    /// Target course does not exist.
    CourseNotFound(CourseId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for DirectoryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Roster(err) => write!(f, "{err}"),
            Self::StudentValidation(err) => write!(f, "{err}"),
            Self::CourseValidation(err) => write!(f, "{err}"),
            Self::DuplicateStudentNumber(value) => {
                write!(f, "student number already in use: {value}")
            }
            Self::DuplicateUserAccount(id) => {
                write!(f, "user account already linked to a student: {id}")
            }
            Self::DuplicateCourseCode(value) => write!(f, "course code already in use: {value}"),
            Self::DuplicateCourseName(value) => write!(f, "course name already in use: {value}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid directory data: {message}"),
        }
    }
}

impl Error for DirectoryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Roster(err) => Some(err),
            Self::StudentValidation(err) => Some(err),
            Self::CourseValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DirectoryRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DirectoryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RosterRepoError> for DirectoryRepoError {
    fn from(value: RosterRepoError) -> Self {
        Self::Roster(value)
    }
}

impl From<StudentValidationError> for DirectoryRepoError {
    fn from(value: StudentValidationError) -> Self {
        Self::StudentValidation(value)
    }
}

impl From<CourseValidationError> for DirectoryRepoError {
    fn from(value: CourseValidationError) -> Self {
        Self::CourseValidation(value)
    }
}

/// Row counts removed by a student delete cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudentCascade {
    /// Forward references removed from `student_enrollments`.
    pub enrollments_removed: u64,
    /// Reverse references removed from `course_rosters`.
    pub roster_entries_removed: u64,
}

/// Row counts removed by a course delete cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseCascade {
    /// Reverse references removed from `course_rosters`.
    pub roster_entries_removed: u64,
    /// Forward references removed from `student_enrollments`.
    pub enrollment_refs_removed: u64,
}

/// Repository interface for directory administration.
pub trait DirectoryRepository {
    /// Creates one student and returns the stored aggregate.
    fn create_student(&self, new_student: &NewStudent) -> DirectoryRepoResult<Student>;
    /// Creates one course and returns the stored aggregate.
    fn create_course(&self, new_course: &NewCourse) -> DirectoryRepoResult<Course>;
    /// Loads one student with forward references, or `None`.
    fn get_student(&self, id: StudentId) -> DirectoryRepoResult<Option<Student>>;
    /// Loads one course with reverse references, or `None`.
    fn get_course(&self, id: CourseId) -> DirectoryRepoResult<Option<Course>>;
    /// Looks a student up by unique student number.
    fn find_student_by_number(&self, student_number: &str)
        -> DirectoryRepoResult<Option<Student>>;
    /// Looks a course up by unique code.
    fn find_course_by_code(&self, code: &str) -> DirectoryRepoResult<Option<Course>>;
    /// Lists course ids taught by one teacher, in `code` order.
    fn courses_owned_by(&self, teacher_id: UserId) -> DirectoryRepoResult<Vec<CourseId>>;
    /// Assigns or clears the teacher of a course.
    fn assign_teacher(
        &self,
        course_id: CourseId,
        teacher_id: Option<UserId>,
    ) -> DirectoryRepoResult<()>;
    /// Deletes one student plus both link-table sides.
    fn delete_student(&self, id: StudentId) -> DirectoryRepoResult<StudentCascade>;
    /// Deletes one course plus both link-table sides.
    fn delete_course(&self, id: CourseId) -> DirectoryRepoResult<CourseCascade>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> DirectoryRepoResult<Self> {
        let _ = SqliteRosterRepository::try_new(conn)?;
        Ok(Self { conn })
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create_student(&self, new_student: &NewStudent) -> DirectoryRepoResult<Student> {
        new_student.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if column_value_taken(&tx, "students", "student_number", &new_student.student_number)? {
            return Err(DirectoryRepoError::DuplicateStudentNumber(
                new_student.student_number.clone(),
            ));
        }
        if column_value_taken(&tx, "students", "user_uuid", &new_student.user_id.to_string())? {
            return Err(DirectoryRepoError::DuplicateUserAccount(new_student.user_id));
        }

        let id: StudentId = Uuid::new_v4();
        tx.execute(
            "INSERT INTO students (student_uuid, student_number, user_uuid, parent_uuid)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                new_student.student_number.as_str(),
                new_student.user_id.to_string(),
                new_student.parent_id.map(|value| value.to_string()),
            ],
        )?;
        tx.commit()?;

        self.get_student(id)?
            .ok_or_else(|| DirectoryRepoError::InvalidData("student row missing after insert".into()))
    }

    fn create_course(&self, new_course: &NewCourse) -> DirectoryRepoResult<Course> {
        new_course.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if column_value_taken(&tx, "courses", "code", &new_course.code)? {
            return Err(DirectoryRepoError::DuplicateCourseCode(new_course.code.clone()));
        }
        if column_value_taken(&tx, "courses", "name", &new_course.name)? {
            return Err(DirectoryRepoError::DuplicateCourseName(new_course.name.clone()));
        }

        let id: CourseId = Uuid::new_v4();
        tx.execute(
            "INSERT INTO courses (course_uuid, code, name, teacher_uuid)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                new_course.code.as_str(),
                new_course.name.as_str(),
                new_course.teacher_id.map(|value| value.to_string()),
            ],
        )?;
        tx.commit()?;

        self.get_course(id)?
            .ok_or_else(|| DirectoryRepoError::InvalidData("course row missing after insert".into()))
    }

    fn get_student(&self, id: StudentId) -> DirectoryRepoResult<Option<Student>> {
        let roster = SqliteRosterRepository::try_new(self.conn)?;
        Ok(roster.find_student(id)?)
    }

    fn get_course(&self, id: CourseId) -> DirectoryRepoResult<Option<Course>> {
        let roster = SqliteRosterRepository::try_new(self.conn)?;
        Ok(roster.find_course(id)?)
    }

    fn find_student_by_number(
        &self,
        student_number: &str,
    ) -> DirectoryRepoResult<Option<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                student_uuid,
                student_number,
                user_uuid,
                parent_uuid,
                created_at,
                updated_at
             FROM students
             WHERE student_number = ?1;",
        )?;
        let mut rows = stmt.query([student_number])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn find_course_by_code(&self, code: &str) -> DirectoryRepoResult<Option<Course>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                course_uuid,
                code,
                name,
                teacher_uuid,
                created_at,
                updated_at
             FROM courses
             WHERE code = ?1;",
        )?;
        let mut rows = stmt.query([code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_course_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn courses_owned_by(&self, teacher_id: UserId) -> DirectoryRepoResult<Vec<CourseId>> {
        let mut stmt = self.conn.prepare(
            "SELECT course_uuid
             FROM courses
             WHERE teacher_uuid = ?1
             ORDER BY code ASC;",
        )?;
        let mut rows = stmt.query([teacher_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(
                Uuid::parse_str(&value).map_err(|_| {
                    DirectoryRepoError::InvalidData(format!(
                        "invalid uuid value `{value}` in courses.course_uuid"
                    ))
                })?,
            );
        }
        Ok(ids)
    }

    fn assign_teacher(
        &self,
        course_id: CourseId,
        teacher_id: Option<UserId>,
    ) -> DirectoryRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE courses
             SET teacher_uuid = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_uuid = ?1;",
            params![
                course_id.to_string(),
                teacher_id.map(|value| value.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(DirectoryRepoError::CourseNotFound(course_id));
        }
        Ok(())
    }

    fn delete_student(&self, id: StudentId) -> DirectoryRepoResult<StudentCascade> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_student_exists(&tx, id)?;

        let enrollments_removed = tx.execute(
            "DELETE FROM student_enrollments WHERE student_uuid = ?1;",
            [id.to_string()],
        )? as u64;
        let roster_entries_removed = tx.execute(
            "DELETE FROM course_rosters WHERE student_uuid = ?1;",
            [id.to_string()],
        )? as u64;
        tx.execute(
            "DELETE FROM students WHERE student_uuid = ?1;",
            [id.to_string()],
        )?;

        tx.commit()?;
        Ok(StudentCascade {
            enrollments_removed,
            roster_entries_removed,
        })
    }

    fn delete_course(&self, id: CourseId) -> DirectoryRepoResult<CourseCascade> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_course_exists(&tx, id)?;

        let roster_entries_removed = tx.execute(
            "DELETE FROM course_rosters WHERE course_uuid = ?1;",
            [id.to_string()],
        )? as u64;
        let enrollment_refs_removed = tx.execute(
            "DELETE FROM student_enrollments WHERE course_uuid = ?1;",
            [id.to_string()],
        )? as u64;
        tx.execute(
            "DELETE FROM courses WHERE course_uuid = ?1;",
            [id.to_string()],
        )?;

        tx.commit()?;
        Ok(CourseCascade {
            roster_entries_removed,
            enrollment_refs_removed,
        })
    }
}

fn column_value_taken(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    value: &str,
) -> DirectoryRepoResult<bool> {
    let taken: i64 = tx.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1);"),
        [value],
        |row| row.get(0),
    )?;
    Ok(taken == 1)
}

fn ensure_student_exists(tx: &Transaction<'_>, id: StudentId) -> DirectoryRepoResult<()> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE student_uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DirectoryRepoError::StudentNotFound(id));
    }
    Ok(())
}

fn ensure_course_exists(tx: &Transaction<'_>, id: CourseId) -> DirectoryRepoResult<()> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM courses WHERE course_uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DirectoryRepoError::CourseNotFound(id));
    }
    Ok(())
}
