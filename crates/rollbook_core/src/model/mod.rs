//! Domain model for the enrollment directory.
//!
//! # Responsibility
//! - Define the two enrollment aggregates and the acting-user capability.
//! - Own identity-key validation rules for administrative writes.
//!
//! # Invariants
//! - Every aggregate is identified by a stable UUID.
//! - Reference sets (`enrolled_courses`, `students`) are logically sets:
//!   sorted ascending, duplicate-free.

pub mod actor;
pub mod course;
pub mod student;
