//! Best-effort copy of record-level typed properties.
//!
//! # Invariants
//! - `name` and `title` (any case) are never copied; the record name covers them.
//! - Values are picked by accessor priority: datetime, date, number, choice, text.
//! - The first host error stops this record's property copy and nothing else.

use crate::host::{HostResult, NoteHost};
use crate::model::record::{PropertyAccessors, PropertyValue};
use log::{debug, warn};

const RESERVED_PROPERTY_NAMES: &[&str] = &["name", "title"];

/// What happened while copying one record's properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyCopyReport {
    pub copied: Vec<String>,
    /// No destination handle, or no value to copy.
    pub skipped: Vec<String>,
    /// Error that stopped the copy, if any.
    pub error: Option<String>,
}

/// Copies properties from `source_record` onto same-named destination handles.
pub fn copy_record_properties<H: NoteHost + ?Sized>(
    host: &H,
    source_record: &str,
    target_record: &str,
) -> PropertyCopyReport {
    let mut report = PropertyCopyReport::default();
    if let Err(err) = copy_into(host, source_record, target_record, &mut report) {
        warn!(
            "event=property_copy module=migrate status=error copied={} error={err}",
            report.copied.len()
        );
        report.error = Some(err.to_string());
    }
    report
}

/// Picks the value to copy from a property's typed accessors.
pub fn pick_property_value(accessors: &PropertyAccessors) -> Option<PropertyValue> {
    accessors
        .datetime
        .map(PropertyValue::DateTime)
        .or_else(|| accessors.date.map(PropertyValue::Date))
        .or_else(|| accessors.number.map(PropertyValue::Number))
        .or_else(|| accessors.choice.clone().map(PropertyValue::Choice))
        .or_else(|| accessors.text.clone().map(PropertyValue::Text))
}

fn copy_into<H: NoteHost + ?Sized>(
    host: &H,
    source_record: &str,
    target_record: &str,
    report: &mut PropertyCopyReport,
) -> HostResult<()> {
    for property in host.properties(source_record)? {
        if is_reserved(&property.name) {
            continue;
        }
        let Some(handle) = host.property_handle(target_record, &property.name)? else {
            debug!("event=property_copy module=migrate status=skip reason=no_target_field");
            report.skipped.push(property.name);
            continue;
        };
        let Some(value) = pick_property_value(&property.accessors) else {
            report.skipped.push(property.name);
            continue;
        };
        host.set_property(&handle, &value)?;
        report.copied.push(property.name);
    }
    Ok(())
}

fn is_reserved(name: &str) -> bool {
    let lowered = name.to_lowercase();
    RESERVED_PROPERTY_NAMES.contains(&lowered.as_str())
}
