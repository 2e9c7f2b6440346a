//! Inline segment cloning.
//!
//! Produces owned destination spans from source spans. Only `type`, `text`,
//! `url`, `guid` and `choiceId` survive; absent fields stay absent and
//! present values are copied as-is, whatever their JSON type.

use crate::model::item::{RawSegment, Segment, SegmentSpan, DEFAULT_SEGMENT_KIND};
use serde_json::Value;

/// Clones a source segment list for the destination.
///
/// An empty or absent list becomes one empty text span, so a created line
/// is never content-less.
pub fn clone_segments(segments: Option<&[RawSegment]>) -> Vec<Segment> {
    match segments {
        Some(segments) if !segments.is_empty() => segments.iter().map(clone_segment).collect(),
        _ => vec![Segment::text("")],
    }
}

/// Clones one segment.
pub fn clone_segment(segment: &RawSegment) -> Segment {
    match segment {
        RawSegment::Span(span) => clone_span(span),
        RawSegment::Scalar(value) => Segment::text(stringify_scalar(value)),
    }
}

fn clone_span(span: &SegmentSpan) -> Segment {
    let kind = match &span.kind {
        Some(kind) if is_truthy(kind) => kind.clone(),
        _ => Value::from(DEFAULT_SEGMENT_KIND),
    };
    Segment {
        kind,
        text: span.text.clone(),
        url: span.url.clone(),
        guid: span.guid.clone(),
        choice_id: span.choice_id.clone(),
    }
}

/// Empty strings, zero, `false` and `null` do not count as a span type.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
