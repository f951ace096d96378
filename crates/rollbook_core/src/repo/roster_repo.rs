//! Bidirectional enrollment link store: contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read the two enrollment aggregates together with their reference sets.
//! - Mutate exactly one side of the student<->course relationship per call.
//!
//! # Invariants
//! - Every mutating call issues one single-statement write to one link table;
//!   there is no cross-table transaction on this contract.
//! - Adds are idempotent and guarded on the owning aggregate row; removing an
//!   absent reference is a no-op.
//! - Reference sets are returned sorted ascending and contain no duplicates.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::course::{Course, CourseId};
use crate::model::student::{Student, StudentId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const STUDENT_SELECT_SQL: &str = "SELECT
    student_uuid,
    student_number,
    user_uuid,
    parent_uuid,
    created_at,
    updated_at
FROM students";

const COURSE_SELECT_SQL: &str = "SELECT
    course_uuid,
    code,
    name,
    teacher_uuid,
    created_at,
    updated_at
FROM courses";

pub type RosterRepoResult<T> = Result<T, RosterRepoError>;

/// Errors from enrollment link store operations.
#[derive(Debug)]
pub enum RosterRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RosterRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "roster store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "roster store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "roster store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid enrollment data: {message}"),
        }
    }
}

impl Error for RosterRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RosterRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RosterRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store interface for the bidirectional student<->course relationship.
///
/// `find_*` return an aggregate with its reference set loaded. Mutations are
/// single-side: callers that need both sides consistent must write each side
/// explicitly (the enrollment service) or rebuild in bulk (the reconciler).
pub trait RosterRepository {
    /// Loads one student with forward references, or `None`.
    fn find_student(&self, id: StudentId) -> RosterRepoResult<Option<Student>>;
    /// Loads one course with reverse references, or `None`.
    fn find_course(&self, id: CourseId) -> RosterRepoResult<Option<Course>>;
    /// Adds a forward reference. Returns whether a row was written.
    fn add_course_to_student(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RosterRepoResult<bool>;
    /// Removes a forward reference. Absent reference is a no-op (`false`).
    fn remove_course_from_student(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RosterRepoResult<bool>;
    /// Adds a reverse reference. Returns whether a row was written.
    fn add_student_to_course(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> RosterRepoResult<bool>;
    /// Removes a reverse reference. Absent reference is a no-op (`false`).
    fn remove_student_from_course(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> RosterRepoResult<bool>;
    /// Lists every student with forward references, in `student_number` order.
    fn list_all_students(&self) -> RosterRepoResult<Vec<Student>>;
    /// Lists every course with reverse references, in `code` order.
    fn list_all_courses(&self) -> RosterRepoResult<Vec<Course>>;
    /// Existence check used for orphan detection.
    fn course_exists(&self, id: CourseId) -> RosterRepoResult<bool>;
    /// Empties every course roster in one statement. Returns rows cleared.
    ///
    /// Reconciler-only batch operation; the reverse side is derived state and
    /// may be reset at any time.
    fn reset_all_rosters(&self) -> RosterRepoResult<u64>;
}

/// SQLite-backed enrollment link store.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RosterRepoResult<Self> {
        ensure_roster_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn find_student(&self, id: StudentId) -> RosterRepoResult<Option<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} WHERE student_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn find_course(&self, id: CourseId) -> RosterRepoResult<Option<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} WHERE course_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_course_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn add_course_to_student(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RosterRepoResult<bool> {
        // Guarded on the owning student row: a forward reference lives inside
        // its student aggregate, so without the owner there is nothing to
        // append to. The target course is deliberately not checked.
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO student_enrollments (student_uuid, course_uuid)
             SELECT ?1, ?2
             WHERE EXISTS (SELECT 1 FROM students WHERE student_uuid = ?1);",
            params![student_id.to_string(), course_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn remove_course_from_student(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RosterRepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM student_enrollments
             WHERE student_uuid = ?1 AND course_uuid = ?2;",
            params![student_id.to_string(), course_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn add_student_to_course(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> RosterRepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO course_rosters (course_uuid, student_uuid)
             SELECT ?1, ?2
             WHERE EXISTS (SELECT 1 FROM courses WHERE course_uuid = ?1);",
            params![course_id.to_string(), student_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn remove_student_from_course(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> RosterRepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM course_rosters
             WHERE course_uuid = ?1 AND student_uuid = ?2;",
            params![course_id.to_string(), student_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn list_all_students(&self) -> RosterRepoResult<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} ORDER BY student_number ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(self.conn, row)?);
        }
        Ok(students)
    }

    fn list_all_courses(&self) -> RosterRepoResult<Vec<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} ORDER BY code ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut courses = Vec::new();
        while let Some(row) = rows.next()? {
            courses.push(parse_course_row(self.conn, row)?);
        }
        Ok(courses)
    }

    fn course_exists(&self, id: CourseId) -> RosterRepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM courses WHERE course_uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn reset_all_rosters(&self) -> RosterRepoResult<u64> {
        let cleared = self.conn.execute("DELETE FROM course_rosters;", [])?;
        Ok(cleared as u64)
    }
}

pub(crate) fn parse_student_row(conn: &Connection, row: &Row<'_>) -> RosterRepoResult<Student> {
    let uuid_text: String = row.get("student_uuid")?;
    let id = parse_uuid(&uuid_text, "students.student_uuid")?;
    let user_text: String = row.get("user_uuid")?;
    let parent_text: Option<String> = row.get("parent_uuid")?;

    Ok(Student {
        id,
        student_number: row.get("student_number")?,
        user_id: parse_uuid(&user_text, "students.user_uuid")?,
        parent_id: parent_text
            .map(|value| parse_uuid(&value, "students.parent_uuid"))
            .transpose()?,
        enrolled_courses: load_forward_refs(conn, &uuid_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_course_row(conn: &Connection, row: &Row<'_>) -> RosterRepoResult<Course> {
    let uuid_text: String = row.get("course_uuid")?;
    let id = parse_uuid(&uuid_text, "courses.course_uuid")?;
    let teacher_text: Option<String> = row.get("teacher_uuid")?;

    Ok(Course {
        id,
        code: row.get("code")?,
        name: row.get("name")?,
        teacher_id: teacher_text
            .map(|value| parse_uuid(&value, "courses.teacher_uuid"))
            .transpose()?,
        students: load_reverse_refs(conn, &uuid_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn load_forward_refs(conn: &Connection, student_uuid: &str) -> RosterRepoResult<Vec<CourseId>> {
    let mut stmt = conn.prepare(
        "SELECT course_uuid
         FROM student_enrollments
         WHERE student_uuid = ?1
         ORDER BY course_uuid ASC;",
    )?;
    let mut rows = stmt.query([student_uuid])?;
    let mut refs = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        refs.push(parse_uuid(&value, "student_enrollments.course_uuid")?);
    }
    Ok(refs)
}

fn load_reverse_refs(conn: &Connection, course_uuid: &str) -> RosterRepoResult<Vec<StudentId>> {
    let mut stmt = conn.prepare(
        "SELECT student_uuid
         FROM course_rosters
         WHERE course_uuid = ?1
         ORDER BY student_uuid ASC;",
    )?;
    let mut rows = stmt.query([course_uuid])?;
    let mut refs = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        refs.push(parse_uuid(&value, "course_rosters.student_uuid")?);
    }
    Ok(refs)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RosterRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RosterRepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn ensure_roster_connection_ready(conn: &Connection) -> RosterRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RosterRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["students", "courses", "student_enrollments", "course_rosters"] {
        if !table_exists(conn, table)? {
            return Err(RosterRepoError::MissingRequiredTable(table));
        }
    }

    for (table, column) in [
        ("students", "student_number"),
        ("students", "user_uuid"),
        ("courses", "code"),
        ("courses", "teacher_uuid"),
        ("student_enrollments", "course_uuid"),
        ("course_rosters", "student_uuid"),
    ] {
        if !table_has_column(conn, table, column)? {
            return Err(RosterRepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RosterRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RosterRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
