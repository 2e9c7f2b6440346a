//! Depth-first re-creation of a line-item tree in another record.
//!
//! # Responsibility
//! - Walk the indexed source tree in pre-order.
//! - Create each line right after its previously created sibling.
//! - Copy line attributes before descending into children.
//!
//! # Invariants
//! - Destination sibling order equals source sibling order.
//! - A line whose creation fails is skipped together with its whole subtree.
//! - Item-scope failures never abort the record.

use crate::host::NoteHost;
use crate::migrate::line_meta::copy_line_meta;
use crate::migrate::segments::clone_segments;
use crate::migrate::tree_index::{TreeError, TreeIndex, TreeNodeId};
use crate::model::item::{Item, ItemGuid, NewLineItem};
use crate::model::line_meta::MetaField;
use log::debug;

/// Source line that was not created at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub item_guid: ItemGuid,
    /// Source descendants dropped with it.
    pub lost_descendants: usize,
    pub reason: String,
}

/// Line attribute that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub item_guid: ItemGuid,
    pub field: MetaField,
    pub reason: String,
}

/// Outcome of replicating one record's tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub created: usize,
    pub skipped: Vec<SkippedItem>,
    pub field_failures: Vec<FieldFailure>,
}

/// Recreates source trees through a borrowed host.
pub struct TreeReplicator<'h, H: NoteHost + ?Sized> {
    host: &'h H,
}

impl<'h, H: NoteHost + ?Sized> TreeReplicator<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self { host }
    }

    /// Recreates `items` inside `target_record`.
    ///
    /// Top-level lines go after `anchor` (or first, when `None`).
    ///
    /// # Errors
    /// Returns `TreeError` when the source tree is structurally unusable;
    /// nothing is created in that case.
    pub fn replicate(
        &self,
        items: &[Item],
        target_record: &str,
        anchor: Option<&str>,
    ) -> Result<ReplicationReport, TreeError> {
        let index = TreeIndex::build(items)?;
        Ok(self.replicate_index(&index, target_record, anchor))
    }

    /// Recreates an already validated tree inside `target_record`.
    pub fn replicate_index(
        &self,
        index: &TreeIndex<'_>,
        target_record: &str,
        anchor: Option<&str>,
    ) -> ReplicationReport {
        let mut report = ReplicationReport::default();
        let mut walk = Walk {
            host: self.host,
            index,
            target_record,
            report: &mut report,
        };
        walk.siblings(index.roots(), None, anchor.map(str::to_string));

        debug!(
            "event=tree_replicate module=migrate status=ok created={} skipped={} field_failures={}",
            report.created,
            report.skipped.len(),
            report.field_failures.len()
        );
        report
    }
}

struct Walk<'w, 'a, H: NoteHost + ?Sized> {
    host: &'w H,
    index: &'w TreeIndex<'a>,
    target_record: &'w str,
    report: &'w mut ReplicationReport,
}

impl<H: NoteHost + ?Sized> Walk<'_, '_, H> {
    fn siblings(
        &mut self,
        ids: &[TreeNodeId],
        parent: Option<ItemGuid>,
        mut cursor: Option<ItemGuid>,
    ) {
        let index = self.index;
        for &id in ids {
            if let Some(created) = self.create(id, parent.clone(), cursor.clone()) {
                let children = &index.node(id).children;
                self.siblings(children, Some(created.clone()), None);
                cursor = Some(created);
            }
        }
    }

    fn create(
        &mut self,
        id: TreeNodeId,
        parent: Option<ItemGuid>,
        after: Option<ItemGuid>,
    ) -> Option<ItemGuid> {
        let item = self.index.node(id).item;
        let request = NewLineItem {
            parent,
            after,
            kind: item.kind.clone(),
            segments: clone_segments(item.segments.as_deref()),
            props: item.props.clone(),
        };

        let created = match self.host.create_line_item(self.target_record, &request) {
            Ok(Some(guid)) => guid,
            Ok(None) => {
                self.skip(id, "host returned no line item".to_string());
                return None;
            }
            Err(err) => {
                self.skip(id, err.to_string());
                return None;
            }
        };
        self.report.created += 1;

        let meta = copy_line_meta(self.host, &item.guid, &created);
        self.report
            .field_failures
            .extend(meta.failures().map(|(field, reason)| FieldFailure {
                item_guid: item.guid.clone(),
                field,
                reason: reason.to_string(),
            }));
        Some(created)
    }

    fn skip(&mut self, id: TreeNodeId, reason: String) {
        let item_guid = self.index.node(id).item.guid.clone();
        let lost_descendants = self.index.descendant_count(id);
        debug!(
            "event=line_item_create module=migrate status=skip lost_descendants={lost_descendants}"
        );
        self.report.skipped.push(SkippedItem {
            item_guid,
            lost_descendants,
            reason,
        });
    }
}
