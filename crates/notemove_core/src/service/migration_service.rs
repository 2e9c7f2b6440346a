//! Record migration use-case service.
//!
//! # Responsibility
//! - List the collections a migration may read from or write to.
//! - Start a batch migration with validated options.
//!
//! # Invariants
//! - Journal collections never appear as source or target candidates.
//! - A migration needs at least two non-journal collections.
//! - `begin_migration` always returns a summary once the host is usable.

use crate::host::{HostError, NoteHost};
use crate::migrate::batch::{BatchOrchestrator, MigrationOptions, MigrationSummary};
use crate::migrate::resolver::{Sleeper, ThreadSleeper};
use crate::model::record::{Collection, Record, RecordGuid};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from migration service operations.
#[derive(Debug)]
pub enum MigrationServiceError {
    /// Fewer than two non-journal collections exist.
    NotEnoughCollections { available: usize },
    /// Collection does not exist.
    CollectionNotFound(String),
    /// Host-level failure.
    Host(HostError),
}

impl Display for MigrationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEnoughCollections { available } => write!(
                f,
                "need at least two non-journal collections, found {available}"
            ),
            Self::CollectionNotFound(guid) => write!(f, "collection not found: {guid}"),
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MigrationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for MigrationServiceError {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

/// Migration service facade.
pub struct MigrationService<H: NoteHost, S: Sleeper = ThreadSleeper> {
    orchestrator: BatchOrchestrator<H, S>,
}

impl<H: NoteHost> MigrationService<H> {
    pub fn new(host: H, options: MigrationOptions) -> Self {
        Self {
            orchestrator: BatchOrchestrator::new(host, options),
        }
    }
}

impl<H: NoteHost, S: Sleeper> MigrationService<H, S> {
    /// Creates service with a custom sleeper for record resolution.
    pub fn with_sleeper(host: H, options: MigrationOptions, sleeper: S) -> Self {
        Self {
            orchestrator: BatchOrchestrator::with_sleeper(host, options, sleeper),
        }
    }

    pub fn options(&self) -> &MigrationOptions {
        self.orchestrator.options()
    }

    /// Lists collections records can be moved out of.
    ///
    /// # Errors
    /// - `NotEnoughCollections` when there is no possible target.
    pub fn source_collections(&self) -> Result<Vec<Collection>, MigrationServiceError> {
        let eligible = self.eligible_collections()?;
        if eligible.len() < 2 {
            return Err(MigrationServiceError::NotEnoughCollections {
                available: eligible.len(),
            });
        }
        Ok(eligible)
    }

    /// Lists collections records from `source_guid` can be moved into.
    pub fn target_collections(
        &self,
        source_guid: &str,
    ) -> Result<Vec<Collection>, MigrationServiceError> {
        Ok(self
            .source_collections()?
            .into_iter()
            .filter(|collection| collection.guid != source_guid)
            .collect())
    }

    /// Lists records of one collection in host order.
    pub fn list_records(&self, collection_guid: &str) -> Result<Vec<Record>, MigrationServiceError> {
        let host = self.orchestrator.host();
        let exists = host
            .list_collections()?
            .iter()
            .any(|collection| collection.guid == collection_guid);
        if !exists {
            return Err(MigrationServiceError::CollectionNotFound(
                collection_guid.to_string(),
            ));
        }
        host.list_records(collection_guid).map_err(Into::into)
    }

    /// Migrates selected records and returns the run summary.
    pub fn begin_migration(
        &self,
        source_guid: &str,
        target_guid: &str,
        selected: &[RecordGuid],
    ) -> MigrationSummary {
        let summary = self.orchestrator.run(source_guid, target_guid, selected);
        info!(
            "event=migration_finish module=service status={} moved={} failed={}",
            if summary.has_failures() { "error" } else { "ok" },
            summary.moved,
            summary.failed
        );
        summary
    }

    fn eligible_collections(&self) -> Result<Vec<Collection>, MigrationServiceError> {
        Ok(self
            .orchestrator
            .host()
            .list_collections()?
            .into_iter()
            .filter(|collection| !collection.is_journal)
            .collect())
    }
}
