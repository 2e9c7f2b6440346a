//! Per-line display/behavior attributes.
//!
//! These live outside the item payload on the host side and are copied
//! field by field after a line has been created.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One independently copyable line attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    TaskStatus,
    BlockStyle,
    HeadingSize,
    HighlightLanguage,
    Icon,
    LinkStyle,
}

impl MetaField {
    /// Copy order used by the metadata copier.
    pub const ALL: [MetaField; 6] = [
        Self::TaskStatus,
        Self::BlockStyle,
        Self::HeadingSize,
        Self::HighlightLanguage,
        Self::Icon,
        Self::LinkStyle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskStatus => "task_status",
            Self::BlockStyle => "block_style",
            Self::HeadingSize => "heading_size",
            Self::HighlightLanguage => "highlight_language",
            Self::Icon => "icon",
            Self::LinkStyle => "link_style",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }
}

impl Display for MetaField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one line attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Number(i64),
    Text(String),
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::MetaField;

    #[test]
    fn meta_field_strings_round_trip() {
        for field in MetaField::ALL {
            assert_eq!(MetaField::parse(field.as_str()), Some(field));
        }
        assert_eq!(MetaField::parse("color"), None);
    }
}
