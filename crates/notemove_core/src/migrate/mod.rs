//! Line-tree migration core.
//!
//! Leaf to root: `tree_index` and `segments`, then `line_meta` and
//! `properties`, then `replicator` and `resolver`, then `batch`.

pub mod batch;
pub mod line_meta;
pub mod properties;
pub mod replicator;
pub mod resolver;
pub mod segments;
pub mod tree_index;

pub use batch::{
    BatchOrchestrator, FailureSample, MigrationOptions, MigrationStrategy, MigrationSummary,
    MigrationWarning, RecordFailure, RecordOutcome, RecordState,
};
pub use replicator::{ReplicationReport, TreeReplicator};
pub use resolver::{RetryPoller, Sleeper, ThreadSleeper};
pub use tree_index::{TreeError, TreeIndex};
