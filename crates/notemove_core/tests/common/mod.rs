//! Scripted in-memory host shared by integration tests.

#![allow(dead_code)]

use notemove_core::host::{HostError, HostResult, LineMetaAccess, NativeMove, NoteHost};
use notemove_core::migrate::resolver::Sleeper;
use notemove_core::model::item::{Item, ItemGuid, ItemProps, NewLineItem};
use notemove_core::model::line_meta::{MetaField, MetaValue};
use notemove_core::model::record::{
    Collection, PropertyHandle, PropertyKind, PropertyValue, Record, TypedProperty,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Line created through `create_line_item`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedLine {
    pub guid: ItemGuid,
    pub record_guid: String,
    pub parent: Option<ItemGuid>,
    pub kind: String,
    pub text: String,
    pub props: Option<ItemProps>,
}

#[derive(Default)]
pub struct FakeHost {
    collections: Vec<Collection>,
    records: RefCell<Vec<Record>>,
    items: HashMap<String, Vec<Item>>,
    properties: HashMap<String, Vec<TypedProperty>>,
    fields: HashMap<String, Vec<(String, PropertyKind)>>,
    fail_record_creations: HashSet<usize>,
    record_creations: Cell<usize>,
    resolve_lag: u32,
    pending_polls: RefCell<HashMap<String, u32>>,
    pub resolve_calls: Cell<u32>,
    fail_line_texts: HashSet<String>,
    error_line_texts: HashSet<String>,
    lines: RefCell<Vec<CreatedLine>>,
    siblings: RefCell<HashMap<(String, Option<String>), Vec<String>>>,
    pub set_calls: RefCell<Vec<(PropertyHandle, PropertyValue)>>,
    failing_properties: HashSet<String>,
    unreadable_properties: HashSet<String>,
    next_id: Cell<u64>,
    meta: Option<FakeMeta>,
    mover: Option<FakeMover>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, guid: &str, is_journal: bool) -> Self {
        self.collections.push(Collection {
            guid: guid.to_string(),
            name: format!("Collection {guid}"),
            is_journal,
        });
        self
    }

    pub fn with_record(self, collection_guid: &str, guid: &str, name: &str) -> Self {
        self.records.borrow_mut().push(Record {
            guid: guid.to_string(),
            collection_guid: collection_guid.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_items(mut self, record_guid: &str, items: Vec<Item>) -> Self {
        self.items.insert(record_guid.to_string(), items);
        self
    }

    pub fn with_properties(mut self, record_guid: &str, properties: Vec<TypedProperty>) -> Self {
        self.properties.insert(record_guid.to_string(), properties);
        self
    }

    /// Declares a writable field on every record of `collection_guid`.
    pub fn with_field(mut self, collection_guid: &str, name: &str, kind: PropertyKind) -> Self {
        self.fields
            .entry(collection_guid.to_string())
            .or_default()
            .push((name.to_string(), kind));
        self
    }

    /// Writes to the property `name` fail with a host error.
    pub fn failing_property(mut self, name: &str) -> Self {
        self.failing_properties.insert(name.to_string());
        self
    }

    /// Reading properties of `record_guid` fails with a host error.
    pub fn unreadable_properties(mut self, record_guid: &str) -> Self {
        self.unreadable_properties.insert(record_guid.to_string());
        self
    }

    /// Makes the `nth` (one-based) `create_record` call return no id.
    pub fn failing_record_creation(mut self, nth: usize) -> Self {
        self.fail_record_creations.insert(nth);
        self
    }

    /// New records resolve only after `polls` empty lookups.
    pub fn with_resolve_lag(mut self, polls: u32) -> Self {
        self.resolve_lag = polls;
        self
    }

    /// Lines whose text equals `text` are not created.
    pub fn failing_line(mut self, text: &str) -> Self {
        self.fail_line_texts.insert(text.to_string());
        self
    }

    /// Lines whose text equals `text` fail with a host error.
    pub fn erroring_line(mut self, text: &str) -> Self {
        self.error_line_texts.insert(text.to_string());
        self
    }

    pub fn with_meta(mut self, meta: FakeMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_mover(mut self, mover: FakeMover) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn meta(&self) -> &FakeMeta {
        self.meta.as_ref().expect("fake host has no line meta")
    }

    pub fn mover(&self) -> &FakeMover {
        self.mover.as_ref().expect("fake host has no mover")
    }

    pub fn record(&self, guid: &str) -> Option<Record> {
        self.records
            .borrow()
            .iter()
            .find(|record| record.guid == guid)
            .cloned()
    }

    pub fn records_in(&self, collection_guid: &str) -> Vec<Record> {
        self.records
            .borrow()
            .iter()
            .filter(|record| record.collection_guid == collection_guid)
            .cloned()
            .collect()
    }

    pub fn record_creations(&self) -> usize {
        self.record_creations.get()
    }

    pub fn created_lines(&self) -> Vec<CreatedLine> {
        self.lines.borrow().clone()
    }

    /// Texts of created children under `parent`, in destination order.
    pub fn child_texts(&self, record_guid: &str, parent: Option<&str>) -> Vec<String> {
        let key = (record_guid.to_string(), parent.map(str::to_string));
        let siblings = self.siblings.borrow();
        let lines = self.lines.borrow();
        siblings
            .get(&key)
            .map(|guids| {
                guids
                    .iter()
                    .filter_map(|guid| lines.iter().find(|line| &line.guid == guid))
                    .map(|line| line.text.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Guid of the created line whose text is `text`.
    pub fn line_guid(&self, text: &str) -> Option<String> {
        self.lines
            .borrow()
            .iter()
            .find(|line| line.text == text)
            .map(|line| line.guid.clone())
    }

    fn next_guid(&self, prefix: &str) -> String {
        let next = self.next_id.get() + 1;
        self.next_id.set(next);
        format!("{prefix}-{next}")
    }
}

impl NoteHost for FakeHost {
    fn list_collections(&self) -> HostResult<Vec<Collection>> {
        Ok(self.collections.clone())
    }

    fn list_records(&self, collection_guid: &str) -> HostResult<Vec<Record>> {
        Ok(self.records_in(collection_guid))
    }

    fn create_record(&self, collection_guid: &str, name: &str) -> HostResult<Option<String>> {
        let nth = self.record_creations.get() + 1;
        self.record_creations.set(nth);
        if self.fail_record_creations.contains(&nth) {
            return Ok(None);
        }
        let guid = self.next_guid("new-record");
        self.records.borrow_mut().push(Record {
            guid: guid.clone(),
            collection_guid: collection_guid.to_string(),
            name: name.to_string(),
        });
        self.pending_polls
            .borrow_mut()
            .insert(guid.clone(), self.resolve_lag);
        Ok(Some(guid))
    }

    fn resolve_record(&self, record_guid: &str) -> HostResult<Option<Record>> {
        self.resolve_calls.set(self.resolve_calls.get() + 1);
        if let Some(remaining) = self.pending_polls.borrow_mut().get_mut(record_guid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(self.record(record_guid))
    }

    fn line_items(&self, record_guid: &str) -> HostResult<Option<Vec<Item>>> {
        Ok(self.items.get(record_guid).cloned())
    }

    fn create_line_item(
        &self,
        record_guid: &str,
        request: &NewLineItem,
    ) -> HostResult<Option<ItemGuid>> {
        let text: String = request
            .segments
            .iter()
            .filter_map(|segment| segment.text_str())
            .collect();
        if self.error_line_texts.contains(&text) {
            return Err(HostError::Unavailable("scripted line error".to_string()));
        }
        if self.fail_line_texts.contains(&text) {
            return Ok(None);
        }

        let key = (record_guid.to_string(), request.parent.clone());
        let mut siblings = self.siblings.borrow_mut();
        let list = siblings.entry(key).or_default();
        let position = match request.after.as_deref() {
            None => 0,
            Some(after) => match list.iter().position(|guid| guid == after) {
                Some(index) => index + 1,
                None => return Ok(None),
            },
        };
        let guid = self.next_guid("line");
        list.insert(position, guid.clone());
        self.lines.borrow_mut().push(CreatedLine {
            guid: guid.clone(),
            record_guid: record_guid.to_string(),
            parent: request.parent.clone(),
            kind: request.kind.clone(),
            text,
            props: request.props.clone(),
        });
        Ok(Some(guid))
    }

    fn properties(&self, record_guid: &str) -> HostResult<Vec<TypedProperty>> {
        if self.unreadable_properties.contains(record_guid) {
            return Err(HostError::Unavailable("scripted property read error".to_string()));
        }
        Ok(self.properties.get(record_guid).cloned().unwrap_or_default())
    }

    fn property_handle(
        &self,
        record_guid: &str,
        name: &str,
    ) -> HostResult<Option<PropertyHandle>> {
        let Some(record) = self.record(record_guid) else {
            return Err(HostError::NotFound {
                entity: "record",
                guid: record_guid.to_string(),
            });
        };
        Ok(self
            .fields
            .get(&record.collection_guid)
            .and_then(|fields| fields.iter().find(|(field, _)| field == name))
            .map(|(field, kind)| PropertyHandle {
                record_guid: record_guid.to_string(),
                name: field.clone(),
                kind: *kind,
            }))
    }

    fn set_property(&self, handle: &PropertyHandle, value: &PropertyValue) -> HostResult<()> {
        if self.failing_properties.contains(&handle.name) {
            return Err(HostError::Unavailable("scripted property write error".to_string()));
        }
        self.set_calls
            .borrow_mut()
            .push((handle.clone(), value.clone()));
        Ok(())
    }

    fn line_meta(&self) -> Option<&dyn LineMetaAccess> {
        self.meta.as_ref().map(|meta| meta as &dyn LineMetaAccess)
    }

    fn native_move(&self) -> Option<&dyn NativeMove> {
        self.mover.as_ref().map(|mover| mover as &dyn NativeMove)
    }
}

/// Scripted line attribute store.
#[derive(Default)]
pub struct FakeMeta {
    readable: Vec<MetaField>,
    writable: Vec<MetaField>,
    failing: HashSet<MetaField>,
    values: RefCell<HashMap<(String, MetaField), MetaValue>>,
    pub get_calls: RefCell<Vec<MetaField>>,
    pub set_calls: Cell<usize>,
}

impl FakeMeta {
    /// Reads and writes every field.
    pub fn full() -> Self {
        Self::with_fields(&MetaField::ALL, &MetaField::ALL)
    }

    pub fn with_fields(readable: &[MetaField], writable: &[MetaField]) -> Self {
        Self {
            readable: readable.to_vec(),
            writable: writable.to_vec(),
            ..Self::default()
        }
    }

    /// Writes of `field` fail with a host error.
    pub fn failing(mut self, field: MetaField) -> Self {
        self.failing.insert(field);
        self
    }

    pub fn seed(self, item_guid: &str, field: MetaField, value: impl Into<MetaValue>) -> Self {
        self.values
            .borrow_mut()
            .insert((item_guid.to_string(), field), value.into());
        self
    }

    pub fn value(&self, item_guid: &str, field: MetaField) -> Option<MetaValue> {
        self.values
            .borrow()
            .get(&(item_guid.to_string(), field))
            .cloned()
    }
}

impl LineMetaAccess for FakeMeta {
    fn readable_fields(&self) -> &[MetaField] {
        &self.readable
    }

    fn writable_fields(&self) -> &[MetaField] {
        &self.writable
    }

    fn get_meta(&self, item_guid: &str, field: MetaField) -> HostResult<Option<MetaValue>> {
        assert!(self.readable.contains(&field), "read of undeclared field {field}");
        self.get_calls.borrow_mut().push(field);
        Ok(self.value(item_guid, field))
    }

    fn set_meta(&self, item_guid: &str, field: MetaField, value: &MetaValue) -> HostResult<()> {
        assert!(self.writable.contains(&field), "write of undeclared field {field}");
        self.set_calls.set(self.set_calls.get() + 1);
        if self.failing.contains(&field) {
            return Err(HostError::Unavailable(format!("cannot write {field}")));
        }
        self.values
            .borrow_mut()
            .insert((item_guid.to_string(), field), value.clone());
        Ok(())
    }
}

/// Scripted native move capability.
#[derive(Default)]
pub struct FakeMover {
    rejected: HashSet<String>,
    pub moves: RefCell<Vec<(String, String)>>,
}

impl FakeMover {
    pub fn rejecting(mut self, record_guid: &str) -> Self {
        self.rejected.insert(record_guid.to_string());
        self
    }
}

impl NativeMove for FakeMover {
    fn move_to_collection(&self, record_guid: &str, collection_guid: &str) -> HostResult<bool> {
        if self.rejected.contains(record_guid) {
            return Ok(false);
        }
        self.moves
            .borrow_mut()
            .push((record_guid.to_string(), collection_guid.to_string()));
        Ok(true)
    }
}

/// Sleeper that records requested waits instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

pub fn text_item(guid: &str, text: &str) -> Item {
    Item::new(guid, "text").with_text(text)
}
