//! Core of notemove: copies or moves note records, line trees included,
//! between collections of a host note store.

pub mod db;
pub mod host;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use host::{HostError, HostResult, LineMetaAccess, NativeMove, NoteHost, SqliteNoteHost};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use migrate::{
    BatchOrchestrator, MigrationOptions, MigrationStrategy, MigrationSummary, MigrationWarning,
    RecordFailure, RecordOutcome, RecordState, TreeError, TreeReplicator,
};
pub use model::item::{Item, ItemGuid, NewLineItem, RawSegment, Segment};
pub use model::record::{Collection, PropertyKind, PropertyValue, Record, TypedProperty};
pub use service::migration_service::{MigrationService, MigrationServiceError};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
