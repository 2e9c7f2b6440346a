//! SQLite-backed reference host.
//!
//! # Responsibility
//! - Implement every `NoteHost` capability over the migrated schema.
//! - Provide authoring helpers (collections, fields, properties) for seeding.
//!
//! # Invariants
//! - Sibling order is `sort_order ASC` within one `(record, parent)` pair.
//! - Inserting after a sibling bumps the following siblings by one.
//! - Property handles exist only for fields declared by the record's collection.
//! - Journals never take part in a native move.

use super::{HostError, HostResult, LineMetaAccess, NativeMove, NoteHost};
use crate::db::migrations::latest_version;
use crate::model::item::{Item, ItemGuid, ItemProps, NewLineItem, RawSegment};
use crate::model::line_meta::{MetaField, MetaValue};
use crate::model::record::{
    Collection, PropertyHandle, PropertyKind, PropertyValue, Record, RecordGuid, TypedProperty,
};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &[
    "collections",
    "collection_fields",
    "records",
    "record_properties",
    "line_items",
    "line_item_meta",
];

const SUPPORTED_META_FIELDS: &[MetaField] = &MetaField::ALL;

/// Reference host over a migrated SQLite connection.
pub struct SqliteNoteHost<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteHost<'conn> {
    /// Creates host from migrated connection.
    ///
    /// # Errors
    /// - Returns `HostError::InvalidData` when the schema version or tables
    ///   do not match this binary.
    pub fn try_new(conn: &'conn Connection) -> HostResult<Self> {
        ensure_host_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates one collection.
    pub fn create_collection(&self, name: &str, is_journal: bool) -> HostResult<Collection> {
        let guid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO collections (guid, name, is_journal) VALUES (?1, ?2, ?3);",
            params![guid, name, is_journal],
        )?;
        Ok(Collection {
            guid,
            name: name.to_string(),
            is_journal,
        })
    }

    /// Declares one typed property on a collection schema.
    pub fn define_field(
        &self,
        collection_guid: &str,
        name: &str,
        kind: PropertyKind,
    ) -> HostResult<()> {
        ensure_collection_exists(self.conn, collection_guid)?;
        self.conn.execute(
            "INSERT INTO collection_fields (collection_guid, name, kind, sort_order)
             VALUES (
                ?1,
                ?2,
                ?3,
                (SELECT COALESCE(MAX(sort_order), -1) + 1
                 FROM collection_fields
                 WHERE collection_guid = ?1)
             )
             ON CONFLICT(collection_guid, name) DO UPDATE SET kind = excluded.kind;",
            params![collection_guid, name, kind.as_str()],
        )?;
        Ok(())
    }

    /// Sets one declared property on a record.
    ///
    /// # Errors
    /// - Returns `HostError::NotFound` when the record's collection does not
    ///   declare `name`.
    pub fn set_record_property(
        &self,
        record_guid: &str,
        name: &str,
        value: &PropertyValue,
    ) -> HostResult<()> {
        let handle =
            self.property_handle(record_guid, name)?
                .ok_or_else(|| HostError::NotFound {
                    entity: "property",
                    guid: format!("{record_guid}/{name}"),
                })?;
        self.set_property(&handle, value)
    }

    /// Loads one record by id.
    pub fn get_record(&self, record_guid: &str) -> HostResult<Option<Record>> {
        let record = self
            .conn
            .query_row(
                "SELECT guid, collection_guid, name FROM records WHERE guid = ?1;",
                [record_guid],
                parse_record_row,
            )
            .optional()?;
        Ok(record)
    }
}

impl NoteHost for SqliteNoteHost<'_> {
    fn list_collections(&self) -> HostResult<Vec<Collection>> {
        let mut stmt = self.conn.prepare(
            "SELECT guid, name, is_journal
             FROM collections
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut collections = Vec::new();
        while let Some(row) = rows.next()? {
            collections.push(parse_collection_row(row)?);
        }
        Ok(collections)
    }

    fn list_records(&self, collection_guid: &str) -> HostResult<Vec<Record>> {
        ensure_collection_exists(self.conn, collection_guid)?;
        let mut stmt = self.conn.prepare(
            "SELECT guid, collection_guid, name
             FROM records
             WHERE collection_guid = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let records = stmt
            .query_map([collection_guid], parse_record_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn create_record(&self, collection_guid: &str, name: &str) -> HostResult<Option<RecordGuid>> {
        if find_collection(self.conn, collection_guid)?.is_none() {
            debug!("event=record_create module=host status=skip reason=collection_missing");
            return Ok(None);
        }
        let guid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO records (guid, collection_guid, name) VALUES (?1, ?2, ?3);",
            params![guid, collection_guid, name],
        )?;
        Ok(Some(guid))
    }

    fn resolve_record(&self, record_guid: &str) -> HostResult<Option<Record>> {
        self.get_record(record_guid)
    }

    fn line_items(&self, record_guid: &str) -> HostResult<Option<Vec<Item>>> {
        if self.get_record(record_guid)?.is_none() {
            return Ok(None);
        }
        let mut stmt = self.conn.prepare(
            "SELECT guid, parent_guid, type, segments_json, props_json
             FROM line_items
             WHERE record_guid = ?1
             ORDER BY parent_guid IS NOT NULL, parent_guid ASC, sort_order ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([record_guid])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_line_item_row(row)?);
        }
        Ok(Some(items))
    }

    fn create_line_item(
        &self,
        record_guid: &str,
        request: &NewLineItem,
    ) -> HostResult<Option<ItemGuid>> {
        let segments_json = serde_json::to_string(&request.segments)
            .map_err(|err| HostError::InvalidData(format!("unserializable segments: {err}")))?;
        let props_json = request
            .props
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| HostError::InvalidData(format!("unserializable props: {err}")))?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !record_exists(&tx, record_guid)? {
            return Ok(None);
        }
        if let Some(parent) = request.parent.as_deref() {
            if load_item_position(&tx, record_guid, parent)?.is_none() {
                debug!("event=line_item_create module=host status=skip reason=parent_missing");
                return Ok(None);
            }
        }

        let sort_order = match request.after.as_deref() {
            None => 0,
            Some(after) => match load_item_position(&tx, record_guid, after)? {
                Some((sibling_parent, sibling_order))
                    if sibling_parent.as_deref() == request.parent.as_deref() =>
                {
                    sibling_order + 1
                }
                _ => {
                    debug!(
                        "event=line_item_create module=host status=skip reason=sibling_mismatch"
                    );
                    return Ok(None);
                }
            },
        };

        tx.execute(
            "UPDATE line_items
             SET sort_order = sort_order + 1
             WHERE record_guid = ?1
               AND parent_guid IS ?2
               AND sort_order >= ?3;",
            params![record_guid, request.parent, sort_order],
        )?;

        let guid = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO line_items (
                guid,
                record_guid,
                parent_guid,
                sort_order,
                type,
                segments_json,
                props_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                guid,
                record_guid,
                request.parent,
                sort_order,
                request.kind,
                segments_json,
                props_json,
            ],
        )?;
        tx.commit()?;
        Ok(Some(guid))
    }

    fn properties(&self, record_guid: &str) -> HostResult<Vec<TypedProperty>> {
        let record = self
            .get_record(record_guid)?
            .ok_or_else(|| HostError::NotFound {
                entity: "record",
                guid: record_guid.to_string(),
            })?;
        let mut stmt = self.conn.prepare(
            "SELECT f.name AS name, f.kind AS kind, p.value AS value
             FROM collection_fields f
             LEFT JOIN record_properties p
               ON p.record_guid = ?2 AND p.name = f.name
             WHERE f.collection_guid = ?1
             ORDER BY f.sort_order ASC;",
        )?;
        let mut rows = stmt.query(params![record.collection_guid, record_guid])?;
        let mut properties = Vec::new();
        while let Some(row) = rows.next()? {
            properties.push(parse_property_row(row)?);
        }
        Ok(properties)
    }

    fn property_handle(
        &self,
        record_guid: &str,
        name: &str,
    ) -> HostResult<Option<PropertyHandle>> {
        let kind_text: Option<String> = self
            .conn
            .query_row(
                "SELECT f.kind
                 FROM records r
                 JOIN collection_fields f ON f.collection_guid = r.collection_guid
                 WHERE r.guid = ?1 AND f.name = ?2;",
                params![record_guid, name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(kind_text) = kind_text else {
            return Ok(None);
        };
        Ok(Some(PropertyHandle {
            record_guid: record_guid.to_string(),
            name: name.to_string(),
            kind: parse_property_kind(&kind_text, "collection_fields.kind")?,
        }))
    }

    fn set_property(&self, handle: &PropertyHandle, value: &PropertyValue) -> HostResult<()> {
        let stored = coerce_property_value(handle, value)?;
        self.conn.execute(
            "INSERT INTO record_properties (record_guid, name, kind, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(record_guid, name) DO UPDATE
             SET kind = excluded.kind, value = excluded.value;",
            params![
                handle.record_guid,
                handle.name,
                handle.kind.as_str(),
                stored.render()
            ],
        )?;
        Ok(())
    }

    fn line_meta(&self) -> Option<&dyn LineMetaAccess> {
        Some(self)
    }

    fn native_move(&self) -> Option<&dyn NativeMove> {
        Some(self)
    }
}

impl LineMetaAccess for SqliteNoteHost<'_> {
    fn readable_fields(&self) -> &[MetaField] {
        SUPPORTED_META_FIELDS
    }

    fn writable_fields(&self) -> &[MetaField] {
        SUPPORTED_META_FIELDS
    }

    fn get_meta(&self, item_guid: &str, field: MetaField) -> HostResult<Option<MetaValue>> {
        let value_json: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM line_item_meta WHERE item_guid = ?1 AND field = ?2;",
                params![item_guid, field.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        value_json
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|err| {
                    HostError::InvalidData(format!(
                        "invalid line_item_meta.value_json for `{field}`: {err}"
                    ))
                })
            })
            .transpose()
    }

    fn set_meta(&self, item_guid: &str, field: MetaField, value: &MetaValue) -> HostResult<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM line_items WHERE guid = ?1);",
            [item_guid],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(HostError::NotFound {
                entity: "line item",
                guid: item_guid.to_string(),
            });
        }
        let value_json = serde_json::to_string(value)
            .map_err(|err| HostError::InvalidData(format!("unserializable meta value: {err}")))?;
        self.conn.execute(
            "INSERT INTO line_item_meta (item_guid, field, value_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(item_guid, field) DO UPDATE SET value_json = excluded.value_json;",
            params![item_guid, field.as_str(), value_json],
        )?;
        Ok(())
    }
}

impl NativeMove for SqliteNoteHost<'_> {
    fn move_to_collection(&self, record_guid: &str, collection_guid: &str) -> HostResult<bool> {
        let record = self
            .get_record(record_guid)?
            .ok_or_else(|| HostError::NotFound {
                entity: "record",
                guid: record_guid.to_string(),
            })?;
        let source = find_collection(self.conn, &record.collection_guid)?;
        let target = find_collection(self.conn, collection_guid)?;
        let (Some(source), Some(target)) = (source, target) else {
            return Ok(false);
        };
        if source.is_journal || target.is_journal {
            debug!("event=record_move module=host status=skip reason=journal");
            return Ok(false);
        }

        let updated = self.conn.execute(
            "UPDATE records SET collection_guid = ?2 WHERE guid = ?1;",
            params![record_guid, collection_guid],
        )?;
        if updated == 1 {
            info!("event=record_move module=host status=ok");
        }
        Ok(updated == 1)
    }
}

fn coerce_property_value(
    handle: &PropertyHandle,
    value: &PropertyValue,
) -> HostResult<PropertyValue> {
    if value.kind() == handle.kind {
        return Ok(value.clone());
    }
    if handle.kind == PropertyKind::Text {
        return Ok(PropertyValue::Text(value.render()));
    }
    Err(HostError::TypeMismatch {
        property: handle.name.clone(),
        expected: handle.kind,
        actual: value.kind(),
    })
}

fn find_collection(conn: &Connection, collection_guid: &str) -> HostResult<Option<Collection>> {
    let mut stmt =
        conn.prepare("SELECT guid, name, is_journal FROM collections WHERE guid = ?1;")?;
    let mut rows = stmt.query([collection_guid])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_collection_row(row)?)),
        None => Ok(None),
    }
}

fn ensure_collection_exists(conn: &Connection, collection_guid: &str) -> HostResult<()> {
    match find_collection(conn, collection_guid)? {
        Some(_) => Ok(()),
        None => Err(HostError::NotFound {
            entity: "collection",
            guid: collection_guid.to_string(),
        }),
    }
}

fn record_exists(conn: &Connection, record_guid: &str) -> HostResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM records WHERE guid = ?1);",
        [record_guid],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn load_item_position(
    conn: &Connection,
    record_guid: &str,
    item_guid: &str,
) -> HostResult<Option<(Option<ItemGuid>, i64)>> {
    let position = conn
        .query_row(
            "SELECT parent_guid, sort_order
             FROM line_items
             WHERE record_guid = ?1 AND guid = ?2;",
            params![record_guid, item_guid],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(position)
}

fn parse_collection_row(row: &Row<'_>) -> HostResult<Collection> {
    let is_journal = match row.get::<_, i64>("is_journal")? {
        0 => false,
        1 => true,
        other => {
            return Err(HostError::InvalidData(format!(
                "invalid is_journal value `{other}` in collections.is_journal"
            )));
        }
    };
    Ok(Collection {
        guid: row.get("guid")?,
        name: row.get("name")?,
        is_journal,
    })
}

fn parse_record_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        guid: row.get("guid")?,
        collection_guid: row.get("collection_guid")?,
        name: row.get("name")?,
    })
}

fn parse_line_item_row(row: &Row<'_>) -> HostResult<Item> {
    let segments_text: String = row.get("segments_json")?;
    let segments: Vec<RawSegment> = serde_json::from_str(&segments_text).map_err(|err| {
        HostError::InvalidData(format!("invalid line_items.segments_json: {err}"))
    })?;
    let props = row
        .get::<_, Option<String>>("props_json")?
        .map(|raw| serde_json::from_str::<ItemProps>(&raw))
        .transpose()
        .map_err(|err| HostError::InvalidData(format!("invalid line_items.props_json: {err}")))?;

    Ok(Item {
        guid: row.get("guid")?,
        parent_guid: row.get("parent_guid")?,
        kind: row.get("type")?,
        segments: Some(segments),
        props,
        children: None,
    })
}

fn parse_property_row(row: &Row<'_>) -> HostResult<TypedProperty> {
    let name: String = row.get("name")?;
    let kind_text: String = row.get("kind")?;
    let kind = parse_property_kind(&kind_text, "collection_fields.kind")?;
    match row.get::<_, Option<String>>("value")? {
        None => Ok(TypedProperty::empty(name, kind)),
        Some(raw) => {
            let value = PropertyValue::parse(kind, &raw).map_err(|err| {
                HostError::InvalidData(format!("record_properties.value for `{name}`: {err}"))
            })?;
            Ok(TypedProperty::with_value(name, value))
        }
    }
}

fn parse_property_kind(value: &str, column: &'static str) -> HostResult<PropertyKind> {
    PropertyKind::parse(value)
        .ok_or_else(|| HostError::InvalidData(format!("invalid property kind `{value}` in {column}")))
}

fn ensure_host_connection_ready(conn: &Connection) -> HostResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(HostError::InvalidData(format!(
            "note host requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in REQUIRED_TABLES {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(HostError::InvalidData(format!(
                "note host requires table `{table}`"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SqliteNoteHost;
    use crate::db::open_db_in_memory;
    use crate::host::{HostError, NoteHost};
    use crate::model::item::{NewLineItem, Segment};
    use crate::model::record::{PropertyKind, PropertyValue};

    fn line(parent: Option<&str>, after: Option<&str>, text: &str) -> NewLineItem {
        NewLineItem {
            parent: parent.map(str::to_string),
            after: after.map(str::to_string),
            kind: "text".to_string(),
            segments: vec![Segment::text(text)],
            props: None,
        }
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = rusqlite::Connection::open_in_memory().expect("raw connection");
        let err = SqliteNoteHost::try_new(&conn)
            .err()
            .expect("unmigrated connection must be rejected");
        assert!(matches!(
            err,
            HostError::InvalidData(message) if message.contains("schema version")
        ));
    }

    #[test]
    fn insert_after_sibling_bumps_following_siblings() {
        let conn = open_db_in_memory().expect("open db");
        let host = SqliteNoteHost::try_new(&conn).expect("host");
        let collection = host.create_collection("Notes", false).expect("collection");
        let record = host
            .create_record(&collection.guid, "Doc")
            .expect("create record")
            .expect("record guid");

        let first = host
            .create_line_item(&record, &line(None, None, "first"))
            .expect("create first")
            .expect("first guid");
        let third = host
            .create_line_item(&record, &line(None, Some(&first), "third"))
            .expect("create third")
            .expect("third guid");
        let second = host
            .create_line_item(&record, &line(None, Some(&first), "second"))
            .expect("create second")
            .expect("second guid");

        let items = host
            .line_items(&record)
            .expect("list items")
            .expect("record exists");
        let order: Vec<&str> = items.iter().map(|item| item.guid.as_str()).collect();
        assert_eq!(order, vec![first.as_str(), second.as_str(), third.as_str()]);
    }

    #[test]
    fn create_line_item_with_foreign_sibling_returns_none() {
        let conn = open_db_in_memory().expect("open db");
        let host = SqliteNoteHost::try_new(&conn).expect("host");
        let collection = host.create_collection("Notes", false).expect("collection");
        let record = host
            .create_record(&collection.guid, "Doc")
            .expect("create record")
            .expect("record guid");
        let root = host
            .create_line_item(&record, &line(None, None, "root"))
            .expect("create root")
            .expect("root guid");

        let created = host
            .create_line_item(&record, &line(Some(&root), Some(&root), "child"))
            .expect("mismatched sibling is not an error");
        assert_eq!(created, None);
    }

    #[test]
    fn text_field_accepts_any_value_but_number_field_rejects_text() {
        let conn = open_db_in_memory().expect("open db");
        let host = SqliteNoteHost::try_new(&conn).expect("host");
        let collection = host.create_collection("Notes", false).expect("collection");
        host.define_field(&collection.guid, "Summary", PropertyKind::Text)
            .expect("define text field");
        host.define_field(&collection.guid, "Points", PropertyKind::Number)
            .expect("define number field");
        let record = host
            .create_record(&collection.guid, "Doc")
            .expect("create record")
            .expect("record guid");

        host.set_record_property(&record, "Summary", &PropertyValue::Number(3.0))
            .expect("text field should accept rendered number");
        let err = host
            .set_record_property(&record, "Points", &PropertyValue::Text("many".to_string()))
            .expect_err("number field must reject text");
        assert!(matches!(err, HostError::TypeMismatch { .. }));

        let properties = host.properties(&record).expect("list properties");
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].accessors.text.as_deref(), Some("3"));
        assert_eq!(properties[1].accessors.number, None);
    }
}
