//! Domain model shared by host capabilities and migration logic.
//!
//! # Responsibility
//! - Define the host-facing shapes of collections, records and line items.
//! - Keep every shape serde-friendly so snapshots and CLI output are JSON.
//!
//! # Invariants
//! - Host identifiers are opaque strings; the core never parses them.
//! - Item `guid` values are unique within one record's tree.

pub mod item;
pub mod line_meta;
pub mod record;
