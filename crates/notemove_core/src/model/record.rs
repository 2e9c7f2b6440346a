//! Record, collection and typed property model.
//!
//! # Responsibility
//! - Describe the containers a migration reads from and writes into.
//! - Describe record-level typed properties and their accessor surface.
//!
//! # Invariants
//! - Journals are flagged on the collection and never migrated.
//! - A property exposes at most one value per typed accessor.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Host identifier of one record.
pub type RecordGuid = String;

/// Host identifier of one collection.
pub type CollectionGuid = String;

/// Label shown for records with a blank name.
pub const UNTITLED_DISPLAY_NAME: &str = "(Untitled)";

/// Named container of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub guid: CollectionGuid,
    pub name: String,
    /// Journals are excluded from source and target selection.
    pub is_journal: bool,
}

/// One note/document owned by a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub guid: RecordGuid,
    pub collection_guid: CollectionGuid,
    pub name: String,
}

impl Record {
    /// Returns the name, or a placeholder when blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            UNTITLED_DISPLAY_NAME
        } else {
            self.name.as_str()
        }
    }
}

/// Declared kind of one typed property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Text,
    Number,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Choice,
}

impl PropertyKind {
    /// Stable storage/manifest string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Choice => "choice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "datetime" => Some(Self::DateTime),
            "choice" => Some(Self::Choice),
            _ => None,
        }
    }
}

impl Display for PropertyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    #[serde(rename = "datetime")]
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Number(f64),
    Choice(String),
    Text(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::DateTime(_) => PropertyKind::DateTime,
            Self::Date(_) => PropertyKind::Date,
            Self::Number(_) => PropertyKind::Number,
            Self::Choice(_) => PropertyKind::Choice,
            Self::Text(_) => PropertyKind::Text,
        }
    }

    /// Renders the value in its canonical text form.
    ///
    /// Dates use `YYYY-MM-DD`, datetimes RFC 3339.
    pub fn render(&self) -> String {
        match self {
            Self::DateTime(value) => value.to_rfc3339(),
            Self::Date(value) => value.format("%Y-%m-%d").to_string(),
            Self::Number(value) => value.to_string(),
            Self::Choice(value) | Self::Text(value) => value.clone(),
        }
    }

    /// Parses the canonical text form for one kind.
    ///
    /// # Errors
    /// - Returns `PropertyParseError` when `raw` is not valid for `kind`.
    pub fn parse(kind: PropertyKind, raw: &str) -> Result<Self, PropertyParseError> {
        let invalid = || PropertyParseError {
            kind,
            raw: raw.to_string(),
        };
        match kind {
            PropertyKind::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|value| Self::DateTime(value.with_timezone(&Utc)))
                .map_err(|_| invalid()),
            PropertyKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| invalid()),
            PropertyKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(Self::Number)
                .map_err(|_| invalid()),
            PropertyKind::Choice => Ok(Self::Choice(raw.to_string())),
            PropertyKind::Text => Ok(Self::Text(raw.to_string())),
        }
    }
}

/// Stored property text does not match its declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyParseError {
    pub kind: PropertyKind,
    pub raw: String,
}

impl Display for PropertyParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "value `{}` is not a valid {}", self.raw, self.kind)
    }
}

impl Error for PropertyParseError {}

/// Values returned by each typed accessor of one property.
///
/// In practice only one accessor answers, but nothing forbids several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyAccessors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PropertyAccessors {
    /// Accessor set answering only for the value's own kind.
    pub fn from_value(value: PropertyValue) -> Self {
        let mut accessors = Self::default();
        match value {
            PropertyValue::DateTime(value) => accessors.datetime = Some(value),
            PropertyValue::Date(value) => accessors.date = Some(value),
            PropertyValue::Number(value) => accessors.number = Some(value),
            PropertyValue::Choice(value) => accessors.choice = Some(value),
            PropertyValue::Text(value) => accessors.text = Some(value),
        }
        accessors
    }
}

/// One record-level property as read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedProperty {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub accessors: PropertyAccessors,
}

impl TypedProperty {
    /// Declared property without any value.
    pub fn empty(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            accessors: PropertyAccessors::default(),
        }
    }

    pub fn with_value(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            accessors: PropertyAccessors::from_value(value),
        }
    }
}

/// Writable destination property, addressed by record and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyHandle {
    pub record_guid: RecordGuid,
    pub name: String,
    pub kind: PropertyKind,
}

#[cfg(test)]
mod tests {
    use super::{PropertyKind, PropertyValue, Record};
    use chrono::NaiveDate;

    #[test]
    fn date_values_render_and_parse_in_canonical_form() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let rendered = PropertyValue::Date(date).render();
        assert_eq!(rendered, "2024-01-01");
        assert_eq!(
            PropertyValue::parse(PropertyKind::Date, &rendered).expect("date parse"),
            PropertyValue::Date(date)
        );
    }

    #[test]
    fn number_parse_rejects_garbage() {
        let err = PropertyValue::parse(PropertyKind::Number, "twelve")
            .expect_err("non-numeric text must fail");
        assert_eq!(err.kind, PropertyKind::Number);
    }

    #[test]
    fn blank_record_name_uses_placeholder() {
        let record = Record {
            guid: "r1".to_string(),
            collection_guid: "c1".to_string(),
            name: "  ".to_string(),
        };
        assert_eq!(record.display_name(), "(Untitled)");
    }
}
