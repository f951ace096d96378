//! Enrollment integrity core for Rollbook.
//! This crate is the single source of truth for roster invariants.

pub mod api;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::actor::{Actor, Capability, UserId};
pub use model::course::{Course, CourseId, CourseValidationError, NewCourse};
pub use model::student::{NewStudent, Student, StudentId, StudentValidationError};
pub use reconcile::{drift_report, reconcile_enrollments, DriftReport, ReconcileReport};
pub use repo::roster_repo::{
    RosterRepoError, RosterRepoResult, RosterRepository, SqliteRosterRepository,
};
pub use service::enrollment_service::{
    EnrollmentError, EnrollmentOutcome, EnrollmentService, OutcomeStatus, SideWrites,
};
