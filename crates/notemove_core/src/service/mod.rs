//! Core use-case services.
//!
//! # Responsibility
//! - Turn host capabilities and the migration core into use-case level APIs.
//! - Keep the CLI decoupled from host storage details.

pub mod migration_service;
