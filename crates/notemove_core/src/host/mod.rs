//! Host storage capability contracts.
//!
//! # Responsibility
//! - Describe everything the migration core needs from the host application.
//! - Model optional host features as typed capabilities, not runtime probing.
//!
//! # Invariants
//! - The core only reads source data and issues create/move/set requests.
//! - An absent (`Ok(None)`) creation result is a normal outcome, not an error.
//! - Hosts without a capability return `None` from its accessor.

use crate::db::DbError;
use crate::model::item::{Item, ItemGuid, NewLineItem};
use crate::model::line_meta::{MetaField, MetaValue};
use crate::model::record::{
    Collection, PropertyHandle, PropertyKind, PropertyValue, Record, RecordGuid,
    TypedProperty,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteNoteHost;

/// Result type used by host capability calls.
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by host capability calls.
#[derive(Debug)]
pub enum HostError {
    /// Underlying storage failure.
    Db(DbError),
    /// Addressed entity does not exist.
    NotFound {
        entity: &'static str,
        guid: String,
    },
    /// Value kind does not fit the destination property.
    TypeMismatch {
        property: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Host refused or cannot serve the request right now.
    Unavailable(String),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, guid } => write!(f, "{entity} not found: {guid}"),
            Self::TypeMismatch {
                property,
                expected,
                actual,
            } => write!(
                f,
                "property `{property}` expects {expected} value, got {actual}"
            ),
            Self::InvalidData(message) => write!(f, "invalid host data: {message}"),
            Self::Unavailable(message) => write!(f, "host unavailable: {message}"),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for HostError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for HostError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage capabilities consumed by the migration core.
pub trait NoteHost {
    /// Lists every collection, journals included.
    fn list_collections(&self) -> HostResult<Vec<Collection>>;
    /// Lists records of one collection in host order.
    fn list_records(&self, collection_guid: &str) -> HostResult<Vec<Record>>;
    /// Requests a new record; the returned id may not resolve immediately.
    fn create_record(&self, collection_guid: &str, name: &str) -> HostResult<Option<RecordGuid>>;
    /// Resolves a record id into a usable record, if materialized.
    fn resolve_record(&self, record_guid: &str) -> HostResult<Option<Record>>;
    /// Returns the record's line items; `None` means nothing to copy.
    fn line_items(&self, record_guid: &str) -> HostResult<Option<Vec<Item>>>;
    /// Creates one line item positioned by reference.
    fn create_line_item(
        &self,
        record_guid: &str,
        request: &NewLineItem,
    ) -> HostResult<Option<ItemGuid>>;
    /// Lists record-level typed properties.
    fn properties(&self, record_guid: &str) -> HostResult<Vec<TypedProperty>>;
    /// Resolves a writable property on the record by name.
    fn property_handle(&self, record_guid: &str, name: &str)
        -> HostResult<Option<PropertyHandle>>;
    /// Generic property setter.
    fn set_property(&self, handle: &PropertyHandle, value: &PropertyValue) -> HostResult<()>;
    /// Line attribute access, when supported.
    fn line_meta(&self) -> Option<&dyn LineMetaAccess> {
        None
    }
    /// Native cross-collection move, when supported.
    fn native_move(&self) -> Option<&dyn NativeMove> {
        None
    }
}

/// Optional per-line attribute capability.
///
/// Hosts declare which fields they can read and write; the copier never
/// calls `get_meta`/`set_meta` for undeclared fields.
pub trait LineMetaAccess {
    fn readable_fields(&self) -> &[MetaField];
    fn writable_fields(&self) -> &[MetaField];
    fn get_meta(&self, item_guid: &str, field: MetaField) -> HostResult<Option<MetaValue>>;
    fn set_meta(&self, item_guid: &str, field: MetaField, value: &MetaValue) -> HostResult<()>;
}

/// Optional native move capability.
pub trait NativeMove {
    /// Moves one record; `false` means the host refused.
    fn move_to_collection(&self, record_guid: &str, collection_guid: &str) -> HostResult<bool>;
}

impl<H: NoteHost + ?Sized> NoteHost for &H {
    fn list_collections(&self) -> HostResult<Vec<Collection>> {
        (**self).list_collections()
    }

    fn list_records(&self, collection_guid: &str) -> HostResult<Vec<Record>> {
        (**self).list_records(collection_guid)
    }

    fn create_record(&self, collection_guid: &str, name: &str) -> HostResult<Option<RecordGuid>> {
        (**self).create_record(collection_guid, name)
    }

    fn resolve_record(&self, record_guid: &str) -> HostResult<Option<Record>> {
        (**self).resolve_record(record_guid)
    }

    fn line_items(&self, record_guid: &str) -> HostResult<Option<Vec<Item>>> {
        (**self).line_items(record_guid)
    }

    fn create_line_item(
        &self,
        record_guid: &str,
        request: &NewLineItem,
    ) -> HostResult<Option<ItemGuid>> {
        (**self).create_line_item(record_guid, request)
    }

    fn properties(&self, record_guid: &str) -> HostResult<Vec<TypedProperty>> {
        (**self).properties(record_guid)
    }

    fn property_handle(
        &self,
        record_guid: &str,
        name: &str,
    ) -> HostResult<Option<PropertyHandle>> {
        (**self).property_handle(record_guid, name)
    }

    fn set_property(&self, handle: &PropertyHandle, value: &PropertyValue) -> HostResult<()> {
        (**self).set_property(handle, value)
    }

    fn line_meta(&self) -> Option<&dyn LineMetaAccess> {
        (**self).line_meta()
    }

    fn native_move(&self) -> Option<&dyn NativeMove> {
        (**self).native_move()
    }
}
