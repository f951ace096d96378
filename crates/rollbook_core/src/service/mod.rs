//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep transport/CLI layers decoupled from storage details.

pub mod directory_service;
pub mod enrollment_service;
