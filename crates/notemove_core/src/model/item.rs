//! Line item and segment model.
//!
//! # Responsibility
//! - Describe one content line (`Item`) as read from a source record.
//! - Describe inline spans both as read (`RawSegment`) and as written (`Segment`).
//!
//! # Invariants
//! - `children` is an alternate nesting representation; the flat
//!   `parent_guid` links win when both are present.
//! - Optional segment fields stay absent rather than becoming nulls.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Host identifier of one line item.
pub type ItemGuid = String;

/// Open per-item property bag, copied shallowly.
pub type ItemProps = Map<String, Value>;

/// Segment type used when a span has none and for wrapped scalars.
pub const DEFAULT_SEGMENT_KIND: &str = "text";

/// One line/block of content inside a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub guid: ItemGuid,
    /// Empty or unknown parents make the item a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<ItemGuid>,
    /// Serialized as `type` to match host naming.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<RawSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<ItemProps>,
    /// Legacy nested children, used only when no flat child points here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Item>>,
}

impl Item {
    /// Creates a root item without content.
    pub fn new(guid: impl Into<ItemGuid>, kind: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            parent_guid: None,
            kind: kind.into(),
            segments: None,
            props: None,
            children: None,
        }
    }

    /// Sets the flat parent link.
    pub fn with_parent(mut self, parent_guid: impl Into<ItemGuid>) -> Self {
        self.parent_guid = Some(parent_guid.into());
        self
    }

    /// Appends one plain text span.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.segments
            .get_or_insert_with(Vec::new)
            .push(RawSegment::Span(SegmentSpan::text(text)));
        self
    }

    pub fn with_segments(mut self, segments: Vec<RawSegment>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn with_props(mut self, props: ItemProps) -> Self {
        self.props = Some(props);
        self
    }

    pub fn with_children(mut self, children: Vec<Item>) -> Self {
        self.children = Some(children);
        self
    }

    /// Returns the parent link when it is set and non-empty.
    pub fn parent_key(&self) -> Option<&str> {
        self.parent_guid.as_deref().filter(|value| !value.is_empty())
    }
}

/// Inline span exactly as the source host returned it.
///
/// Hosts may hand back either structured spans or bare scalars. Any JSON
/// object is a span, whatever its field values look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawSegment {
    Span(SegmentSpan),
    Scalar(Value),
}

impl<'de> Deserialize<'de> for RawSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            object @ Value::Object(_) => serde_json::from_value(object)
                .map(RawSegment::Span)
                .map_err(de::Error::custom),
            scalar => Ok(RawSegment::Scalar(scalar)),
        }
    }
}

/// Structured source span; every field is optional on read.
///
/// Values are kept as raw JSON so non-string payloads survive the copy.
/// A JSON `null` reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpan {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    #[serde(
        rename = "choiceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub choice_id: Option<Value>,
}

impl SegmentSpan {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some(Value::from(DEFAULT_SEGMENT_KIND)),
            text: Some(Value::String(text.into())),
            ..Self::default()
        }
    }
}

/// Inline span handed to the destination host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    #[serde(
        rename = "choiceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub choice_id: Option<Value>,
}

impl Segment {
    /// Plain text span.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Value::from(DEFAULT_SEGMENT_KIND),
            text: Some(Value::String(text.into())),
            url: None,
            guid: None,
            choice_id: None,
        }
    }

    /// Text payload when it is a JSON string.
    pub fn text_str(&self) -> Option<&str> {
        self.text.as_ref().and_then(Value::as_str)
    }
}

/// Creation request for one destination line item.
///
/// Placement is by reference: `after = None` means "first child of `parent`".
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    /// `None` targets the record's top level.
    pub parent: Option<ItemGuid>,
    /// Previous sibling at the destination, if any.
    pub after: Option<ItemGuid>,
    pub kind: String,
    pub segments: Vec<Segment>,
    pub props: Option<ItemProps>,
}

#[cfg(test)]
mod tests {
    use super::{Item, RawSegment, Segment};
    use serde_json::json;

    #[test]
    fn item_deserializes_host_shape_with_mixed_segments() {
        let item: Item = serde_json::from_value(json!({
            "guid": "a",
            "parent_guid": "",
            "type": "text",
            "segments": [{"type": "link", "text": "x", "url": "https://x"}, "plain", 7]
        }))
        .expect("host item should deserialize");

        assert_eq!(item.parent_key(), None);
        let segments = item.segments.expect("segments should be present");
        assert!(matches!(
            &segments[0],
            RawSegment::Span(span) if span.url == Some(json!("https://x"))
        ));
        assert!(matches!(&segments[1], RawSegment::Scalar(value) if *value == json!("plain")));
        assert!(matches!(&segments[2], RawSegment::Scalar(value) if *value == json!(7)));
    }

    #[test]
    fn objects_with_non_string_fields_stay_spans() {
        let segment: RawSegment = serde_json::from_value(json!({
            "type": "mention",
            "guid": "rec-9",
            "text": 5,
            "url": null
        }))
        .expect("span should deserialize");

        let RawSegment::Span(span) = segment else {
            panic!("object should read as a span");
        };
        assert_eq!(span.kind, Some(json!("mention")));
        assert_eq!(span.guid, Some(json!("rec-9")));
        assert_eq!(span.text, Some(json!(5)));
        assert_eq!(span.url, None);
    }

    #[test]
    fn segment_serialization_omits_absent_fields() {
        let value = serde_json::to_value(Segment::text("hi")).expect("serialize segment");
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }
}
