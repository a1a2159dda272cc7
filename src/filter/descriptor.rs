//! Declarative filter descriptors
//!
//! A descriptor is the wire-level form of one predicate: a target field, a
//! filter type string, a loosely-typed value whose required shape depends on
//! the type, and an optional comparison operator. Descriptors arrive in
//! request bodies and in stored KPI definitions.

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Equality (or inequality via `operator: "!="`)
    Exact,
    /// Set membership; value must be an array
    In,
    /// Timestamp window; value must be `{start, end}`
    DateRange,
    /// Case-insensitive substring match; value must be a string
    Text,
    /// Conjunction; value must be an array of sub-descriptors
    Multiple,
    /// Null / not-null check
    Null,
    /// Numeric bounds; value must be `{min?, max?}` with at least one bound
    Range,
    /// Relation-existence check against another model
    Custom,
}

impl FromStr for FilterType {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(FilterType::Exact),
            "in" => Ok(FilterType::In),
            "date_range" => Ok(FilterType::DateRange),
            "text" => Ok(FilterType::Text),
            "multiple" => Ok(FilterType::Multiple),
            "null" => Ok(FilterType::Null),
            "range" => Ok(FilterType::Range),
            "custom" => Ok(FilterType::Custom),
            other => Err(FilterError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterType::Exact => "exact",
            FilterType::In => "in",
            FilterType::DateRange => "date_range",
            FilterType::Text => "text",
            FilterType::Multiple => "multiple",
            FilterType::Null => "null",
            FilterType::Range => "range",
            FilterType::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// One declarative filter as received on the wire
///
/// `kind` stays a plain string until compilation so that an unknown type is
/// reported as an "unsupported filter type" error instead of failing body
/// deserialization for the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Field the predicate applies to
    pub field: String,
    /// Filter type string (`exact`, `in`, `date_range`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-dependent value
    #[serde(default)]
    pub value: serde_json::Value,
    /// Optional comparison operator (`=`, `!=`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl FilterDescriptor {
    /// Shorthand constructor, mostly for tests and seed definitions
    pub fn new(field: impl Into<String>, kind: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            kind: kind.into(),
            value,
            operator: None,
        }
    }

    /// Parse the type string
    pub fn filter_type(&self) -> Result<FilterType, FilterError> {
        self.kind.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_type_parsing() {
        assert_eq!("exact".parse::<FilterType>().unwrap(), FilterType::Exact);
        assert_eq!(
            "date_range".parse::<FilterType>().unwrap(),
            FilterType::DateRange
        );

        let err = "bogus".parse::<FilterType>().unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedType(t) if t == "bogus"));
    }

    #[test]
    fn test_descriptor_deserialization() {
        let json = serde_json::json!({
            "field": "sede_id",
            "type": "in",
            "value": [1, 2]
        });
        let desc: FilterDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(desc.field, "sede_id");
        assert_eq!(desc.filter_type().unwrap(), FilterType::In);
        assert!(desc.operator.is_none());
    }

    #[test]
    fn test_unknown_type_survives_deserialization() {
        // Unknown types must reach compilation so the batch can skip them
        let json = serde_json::json!({"field": "x", "type": "bogus", "value": 1});
        let desc: FilterDescriptor = serde_json::from_value(json).unwrap();
        assert!(desc.filter_type().is_err());
    }
}
