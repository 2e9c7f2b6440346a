//! Best-effort copy of per-line attributes.
//!
//! # Invariants
//! - Fields are attempted independently, in `MetaField::ALL` order.
//! - A failing field never stops the remaining fields and never propagates.
//! - Undeclared fields are never read or written.

use crate::host::{LineMetaAccess, NoteHost};
use crate::model::line_meta::MetaField;
use log::debug;

/// Result of one field copy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Copied,
    /// Source has no value for this field.
    Absent,
    /// Host cannot read or write this field.
    Unsupported,
    Failed(String),
}

/// Per-field outcomes for one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaCopyReport {
    pub outcomes: Vec<(MetaField, FieldOutcome)>,
}

impl MetaCopyReport {
    pub fn copied_fields(&self) -> impl Iterator<Item = MetaField> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == FieldOutcome::Copied)
            .map(|(field, _)| *field)
    }

    pub fn failures(&self) -> impl Iterator<Item = (MetaField, &str)> + '_ {
        self.outcomes.iter().filter_map(|(field, outcome)| match outcome {
            FieldOutcome::Failed(reason) => Some((*field, reason.as_str())),
            _ => None,
        })
    }
}

/// Copies every supported attribute from `source_item` to `target_item`.
pub fn copy_line_meta<H: NoteHost + ?Sized>(
    host: &H,
    source_item: &str,
    target_item: &str,
) -> MetaCopyReport {
    let Some(access) = host.line_meta() else {
        return MetaCopyReport {
            outcomes: MetaField::ALL
                .into_iter()
                .map(|field| (field, FieldOutcome::Unsupported))
                .collect(),
        };
    };

    let outcomes = MetaField::ALL
        .into_iter()
        .map(|field| (field, copy_field(access, field, source_item, target_item)))
        .collect();
    MetaCopyReport { outcomes }
}

fn copy_field(
    access: &dyn LineMetaAccess,
    field: MetaField,
    source_item: &str,
    target_item: &str,
) -> FieldOutcome {
    if !access.readable_fields().contains(&field) {
        return FieldOutcome::Unsupported;
    }
    let value = match access.get_meta(source_item, field) {
        Ok(Some(value)) => value,
        Ok(None) => return FieldOutcome::Absent,
        Err(err) => {
            debug!("event=line_meta_copy module=migrate status=error field={field} stage=get error={err}");
            return FieldOutcome::Failed(err.to_string());
        }
    };
    if !access.writable_fields().contains(&field) {
        return FieldOutcome::Unsupported;
    }
    match access.set_meta(target_item, field, &value) {
        Ok(()) => FieldOutcome::Copied,
        Err(err) => {
            debug!("event=line_meta_copy module=migrate status=error field={field} stage=set error={err}");
            FieldOutcome::Failed(err.to_string())
        }
    }
}
