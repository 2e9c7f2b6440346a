//! Batch migration of selected records between collections.
//!
//! # Responsibility
//! - Validate the collection pair once per run.
//! - Drive every selected record through `Pending -> InFlight -> Succeeded|Failed`.
//! - Aggregate counts, bounded failure samples and non-fatal warnings.
//!
//! # Invariants
//! - Records are processed one at a time, in selection order.
//! - One record's failure never stops the records after it.
//! - `moved + failed == selected.len()` for every run.
//! - No automatic retry within a run.

use crate::host::{HostError, NoteHost};
use crate::migrate::properties::copy_record_properties;
use crate::migrate::replicator::TreeReplicator;
use crate::migrate::resolver::{
    RetryPoller, Sleeper, ThreadSleeper, DEFAULT_RESOLVE_ATTEMPTS, DEFAULT_RESOLVE_DELAY,
};
use crate::migrate::tree_index::{TreeError, TreeIndex};
use crate::model::item::ItemGuid;
use crate::model::line_meta::MetaField;
use crate::model::record::{Collection, CollectionGuid, Record, RecordGuid};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Name given to destination records whose source name is blank.
pub const DEFAULT_UNTITLED_NAME: &str = "Untitled";
/// Failure samples kept on a summary.
pub const DEFAULT_MAX_FAILURE_SAMPLES: usize = 5;

/// How each record reaches the target collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStrategy {
    /// Native move when the host offers it, copy otherwise.
    #[default]
    Auto,
    Copy,
    NativeMove,
}

impl MigrationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Copy => "copy",
            Self::NativeMove => "native_move",
        }
    }
}

impl Display for MigrationStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(Self::Auto),
            "copy" => Ok(Self::Copy),
            "native_move" | "native-move" => Ok(Self::NativeMove),
            other => Err(format!("unknown migration strategy `{other}`")),
        }
    }
}

/// Tunables for one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    pub strategy: MigrationStrategy,
    pub resolve_attempts: u32,
    pub resolve_delay_ms: u64,
    pub max_failure_samples: usize,
    pub untitled_name: String,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            strategy: MigrationStrategy::Auto,
            resolve_attempts: DEFAULT_RESOLVE_ATTEMPTS,
            resolve_delay_ms: DEFAULT_RESOLVE_DELAY.as_millis() as u64,
            max_failure_samples: DEFAULT_MAX_FAILURE_SAMPLES,
            untitled_name: DEFAULT_UNTITLED_NAME.to_string(),
        }
    }
}

impl MigrationOptions {
    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_delay_ms)
    }
}

/// Lifecycle of one selected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Why a collection cannot take part in a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionIssue {
    NotFound,
    Journal,
}

impl Display for CollectionIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("does not exist"),
            Self::Journal => f.write_str("is a journal"),
        }
    }
}

/// Record-scope failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordFailure {
    SourceCollectionInvalid {
        collection_guid: CollectionGuid,
        issue: CollectionIssue,
    },
    TargetCollectionInvalid {
        collection_guid: CollectionGuid,
        issue: CollectionIssue,
    },
    SameCollection,
    /// Selected id is not a record of the source collection.
    RecordNotFound,
    /// Host returned no id for the new record.
    CreationFailed,
    /// New record never resolved.
    ResolutionTimeout { attempts: u32 },
    /// Host refused the native move.
    MoveRejected,
    NativeMoveUnavailable,
    /// Source tree is structurally unusable.
    Tree { message: String },
    Host { message: String },
}

impl Display for RecordFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceCollectionInvalid {
                collection_guid,
                issue,
            } => write!(f, "source collection {collection_guid} {issue}"),
            Self::TargetCollectionInvalid {
                collection_guid,
                issue,
            } => write!(f, "target collection {collection_guid} {issue}"),
            Self::SameCollection => f.write_str("source and target collection are the same"),
            Self::RecordNotFound => f.write_str("record not found in source collection"),
            Self::CreationFailed => f.write_str("host did not create the target record"),
            Self::ResolutionTimeout { attempts } => {
                write!(f, "target record did not resolve after {attempts} attempts")
            }
            Self::MoveRejected => f.write_str("host rejected the move"),
            Self::NativeMoveUnavailable => f.write_str("host has no native move"),
            Self::Tree { message } => write!(f, "unusable line tree: {message}"),
            Self::Host { message } => write!(f, "host error: {message}"),
        }
    }
}

impl Error for RecordFailure {}

impl From<HostError> for RecordFailure {
    fn from(value: HostError) -> Self {
        Self::Host {
            message: value.to_string(),
        }
    }
}

impl From<TreeError> for RecordFailure {
    fn from(value: TreeError) -> Self {
        Self::Tree {
            message: value.to_string(),
        }
    }
}

/// One failed record, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    pub record_guid: RecordGuid,
    /// Source record name; `None` when the record could not be found.
    pub name: Option<String>,
    pub reason: String,
}

/// Non-fatal problem met while migrating a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationWarning {
    FieldCopy {
        record_guid: RecordGuid,
        item_guid: ItemGuid,
        field: MetaField,
        reason: String,
    },
    ItemSkipped {
        record_guid: RecordGuid,
        item_guid: ItemGuid,
        lost_descendants: usize,
        reason: String,
    },
    PropertyCopy {
        record_guid: RecordGuid,
        reason: String,
    },
}

impl Display for MigrationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCopy {
                record_guid,
                item_guid,
                field,
                reason,
            } => write!(
                f,
                "record {record_guid}: line {item_guid} lost `{field}`: {reason}"
            ),
            Self::ItemSkipped {
                record_guid,
                item_guid,
                lost_descendants,
                reason,
            } => write!(
                f,
                "record {record_guid}: line {item_guid} and {lost_descendants} nested lines skipped: {reason}"
            ),
            Self::PropertyCopy {
                record_guid,
                reason,
            } => write!(f, "record {record_guid}: properties partially copied: {reason}"),
        }
    }
}

/// Final state of one selected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub record_guid: RecordGuid,
    pub state: RecordState,
    /// Destination record (copy) or the moved record itself (native move).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_record_guid: Option<RecordGuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RecordFailure>,
    pub lines_created: usize,
}

impl RecordOutcome {
    fn pending(record_guid: RecordGuid) -> Self {
        Self {
            record_guid,
            state: RecordState::Pending,
            target_record_guid: None,
            failure: None,
            lines_created: 0,
        }
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub moved: usize,
    pub failed: usize,
    pub failure_samples: Vec<FailureSample>,
    pub warnings: Vec<MigrationWarning>,
    pub outcomes: Vec<RecordOutcome>,
}

impl MigrationSummary {
    /// Completion line shown to the user.
    pub fn message(&self) -> String {
        if self.moved == 0 && self.failed == 0 {
            return "No notes selected.".to_string();
        }
        if self.moved == 0 {
            return format!("Failed to move ({} {}).", self.failed, plural(self.failed, "error"));
        }
        let moved = format!("Moved {} {}", self.moved, plural(self.moved, "note"));
        if self.failed == 0 {
            format!("{moved}.")
        } else {
            format!("{moved}; {} failed.", self.failed)
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

/// How records reach the target in this run, after capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Copy,
    NativeMove,
}

struct Task {
    position: usize,
    record_guid: RecordGuid,
}

struct Migrated {
    target_record_guid: RecordGuid,
    lines_created: usize,
}

/// Sequential migration driver.
pub struct BatchOrchestrator<H, S = ThreadSleeper> {
    host: H,
    options: MigrationOptions,
    poller: RetryPoller<S>,
}

impl<H: NoteHost> BatchOrchestrator<H, ThreadSleeper> {
    pub fn new(host: H, options: MigrationOptions) -> Self {
        Self::with_sleeper(host, options, ThreadSleeper)
    }
}

impl<H: NoteHost, S: Sleeper> BatchOrchestrator<H, S> {
    pub fn with_sleeper(host: H, options: MigrationOptions, sleeper: S) -> Self {
        let poller =
            RetryPoller::with_sleeper(options.resolve_attempts, options.resolve_delay(), sleeper);
        Self {
            host,
            options,
            poller,
        }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Migrates `selected` from `source_collection` to `target_collection`.
    ///
    /// Never fails as a whole; every problem is reported on the summary.
    pub fn run(
        &self,
        source_collection: &str,
        target_collection: &str,
        selected: &[RecordGuid],
    ) -> MigrationSummary {
        info!(
            "event=batch_migrate module=migrate status=start selected={} strategy={}",
            selected.len(),
            self.options.strategy
        );

        let mut summary = MigrationSummary {
            outcomes: selected
                .iter()
                .cloned()
                .map(RecordOutcome::pending)
                .collect(),
            ..MigrationSummary::default()
        };

        match self.prepare(source_collection, target_collection) {
            Ok((route, sources)) => {
                let mut queue: VecDeque<Task> = selected
                    .iter()
                    .enumerate()
                    .map(|(position, record_guid)| Task {
                        position,
                        record_guid: record_guid.clone(),
                    })
                    .collect();
                while let Some(task) = queue.pop_front() {
                    summary.outcomes[task.position].state = RecordState::InFlight;
                    let source = sources.get(task.record_guid.as_str());
                    let result = match source {
                        Some(record) => {
                            self.migrate_record(route, record, target_collection, &mut summary)
                        }
                        None => Err(RecordFailure::RecordNotFound),
                    };
                    self.finish(&mut summary, task.position, source, result);
                }
            }
            Err(failure) => {
                warn!("event=batch_migrate module=migrate status=error reason={failure}");
                for position in 0..selected.len() {
                    self.finish(&mut summary, position, None, Err(failure.clone()));
                }
            }
        }

        info!(
            "event=batch_migrate module=migrate status=ok moved={} failed={} warnings={}",
            summary.moved,
            summary.failed,
            summary.warnings.len()
        );
        summary
    }

    fn prepare(
        &self,
        source_collection: &str,
        target_collection: &str,
    ) -> Result<(Route, SourceRecords), RecordFailure> {
        let collections = self.host.list_collections()?;
        check_collection(&collections, source_collection).map_err(|issue| {
            RecordFailure::SourceCollectionInvalid {
                collection_guid: source_collection.to_string(),
                issue,
            }
        })?;
        check_collection(&collections, target_collection).map_err(|issue| {
            RecordFailure::TargetCollectionInvalid {
                collection_guid: target_collection.to_string(),
                issue,
            }
        })?;
        if source_collection == target_collection {
            return Err(RecordFailure::SameCollection);
        }

        let route = match (self.options.strategy, self.host.native_move().is_some()) {
            (MigrationStrategy::Copy, _) | (MigrationStrategy::Auto, false) => Route::Copy,
            (MigrationStrategy::NativeMove, true) | (MigrationStrategy::Auto, true) => {
                Route::NativeMove
            }
            (MigrationStrategy::NativeMove, false) => {
                return Err(RecordFailure::NativeMoveUnavailable)
            }
        };

        let records = self.host.list_records(source_collection)?;
        Ok((route, SourceRecords::new(records)))
    }

    fn migrate_record(
        &self,
        route: Route,
        record: &Record,
        target_collection: &str,
        summary: &mut MigrationSummary,
    ) -> Result<Migrated, RecordFailure> {
        match route {
            Route::Copy => self.copy_record(record, target_collection, summary),
            Route::NativeMove => self.move_record(record, target_collection),
        }
    }

    fn move_record(
        &self,
        record: &Record,
        target_collection: &str,
    ) -> Result<Migrated, RecordFailure> {
        let mover = self
            .host
            .native_move()
            .ok_or(RecordFailure::NativeMoveUnavailable)?;
        if !mover.move_to_collection(&record.guid, target_collection)? {
            return Err(RecordFailure::MoveRejected);
        }
        Ok(Migrated {
            target_record_guid: record.guid.clone(),
            lines_created: 0,
        })
    }

    fn copy_record(
        &self,
        record: &Record,
        target_collection: &str,
        summary: &mut MigrationSummary,
    ) -> Result<Migrated, RecordFailure> {
        let name = if record.name.trim().is_empty() {
            self.options.untitled_name.as_str()
        } else {
            record.name.as_str()
        };
        // The body is validated before anything is written to the target.
        let items = self.host.line_items(&record.guid)?;
        let index = items.as_deref().map(TreeIndex::build).transpose()?;

        let created = self
            .host
            .create_record(target_collection, name)?
            .ok_or(RecordFailure::CreationFailed)?;
        let target = self
            .poller
            .resolve_record(&self.host, &created)
            .ok_or(RecordFailure::ResolutionTimeout {
                attempts: self.poller.max_attempts(),
            })?
            .value;

        let properties = copy_record_properties(&self.host, &record.guid, &target.guid);
        if let Some(reason) = properties.error {
            summary.warnings.push(MigrationWarning::PropertyCopy {
                record_guid: record.guid.clone(),
                reason,
            });
        }

        let Some(index) = index else {
            debug!("event=record_copy module=migrate status=ok lines=0 reason=no_body");
            return Ok(Migrated {
                target_record_guid: target.guid,
                lines_created: 0,
            });
        };
        let report = TreeReplicator::new(&self.host).replicate_index(&index, &target.guid, None);

        summary
            .warnings
            .extend(report.skipped.into_iter().map(|skipped| MigrationWarning::ItemSkipped {
                record_guid: record.guid.clone(),
                item_guid: skipped.item_guid,
                lost_descendants: skipped.lost_descendants,
                reason: skipped.reason,
            }));
        summary.warnings.extend(report.field_failures.into_iter().map(|failure| {
            MigrationWarning::FieldCopy {
                record_guid: record.guid.clone(),
                item_guid: failure.item_guid,
                field: failure.field,
                reason: failure.reason,
            }
        }));

        Ok(Migrated {
            target_record_guid: target.guid,
            lines_created: report.created,
        })
    }

    fn finish(
        &self,
        summary: &mut MigrationSummary,
        position: usize,
        source: Option<&Record>,
        result: Result<Migrated, RecordFailure>,
    ) {
        let outcome = &mut summary.outcomes[position];
        match result {
            Ok(migrated) => {
                debug!(
                    "event=record_migrate module=migrate status=ok position={position} lines={}",
                    migrated.lines_created
                );
                outcome.state = RecordState::Succeeded;
                outcome.target_record_guid = Some(migrated.target_record_guid);
                outcome.lines_created = migrated.lines_created;
                summary.moved += 1;
            }
            Err(failure) => {
                warn!(
                    "event=record_migrate module=migrate status=error position={position} reason={failure}"
                );
                let record_guid = outcome.record_guid.clone();
                outcome.state = RecordState::Failed;
                outcome.failure = Some(failure.clone());
                summary.failed += 1;
                if summary.failure_samples.len() < self.options.max_failure_samples {
                    summary.failure_samples.push(FailureSample {
                        record_guid,
                        name: source.map(|record| record.display_name().to_string()),
                        reason: failure.to_string(),
                    });
                }
            }
        }
    }
}

struct SourceRecords {
    by_guid: HashMap<RecordGuid, Record>,
}

impl SourceRecords {
    fn new(records: Vec<Record>) -> Self {
        Self {
            by_guid: records
                .into_iter()
                .map(|record| (record.guid.clone(), record))
                .collect(),
        }
    }

    fn get(&self, record_guid: &str) -> Option<&Record> {
        self.by_guid.get(record_guid)
    }
}

fn check_collection(collections: &[Collection], guid: &str) -> Result<(), CollectionIssue> {
    match collections.iter().find(|collection| collection.guid == guid) {
        None => Err(CollectionIssue::NotFound),
        Some(collection) if collection.is_journal => Err(CollectionIssue::Journal),
        Some(_) => Ok(()),
    }
}
