//! Core data types used throughout the backend
//!
//! # Key Types
//!
//! - **`FieldValue`**: A single typed field of a stored record
//! - **`Record`**: One row of a model (field name -> value)
//! - **`DateRange`**: Inclusive time window for aggregations
//! - **`PeriodType`**: Named default periods for KPI computation

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single typed field value of a record
///
/// Records are loosely schemaed: each model defines which fields are
/// required, but values themselves carry their type. JSON input maps onto
/// this enum via `from_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent / SQL NULL
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer (ids, counts)
    Int(i64),
    /// Floating point (amounts, scores)
    Float(f64),
    /// Text (names, status strings)
    Text(String),
    /// UTC timestamp (enrollment dates, payment dates)
    Date(DateTime<Utc>),
}

impl FieldValue {
    /// Convert a JSON value into a field value
    ///
    /// Strings that parse as RFC 3339 timestamps become `Date`; everything
    /// else keeps its JSON type. Arrays and objects are not representable as
    /// a single field and collapse to `Null`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => FieldValue::Date(dt.with_timezone(&Utc)),
                Err(_) => FieldValue::Text(s.clone()),
            },
            _ => FieldValue::Null,
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Timestamp view of the value, if it has one
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Stringified form used as a group-by key
    pub fn group_key(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(dt) => dt.to_rfc3339(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_key())
    }
}

/// One row of a model
///
/// Serializes as the flat field map itself, so a record read back from the
/// query endpoint has the same shape the insert endpoint accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set a field
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Get a field, `Null` when absent
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Null)
    }

    /// Whether the record carries the field at all
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over all fields
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Build a record from a JSON object
    pub fn from_json(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = obj
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect();
        Self { fields }
    }
}

/// Inclusive time window for date-bounded aggregations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start of the window (inclusive)
    pub start: DateTime<Utc>,
    /// End of the window (inclusive)
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Create a validated range; fails when start > end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, String> {
        if start > end {
            return Err(format!("invalid date range: start {} > end {}", start, end));
        }
        Ok(Self { start, end })
    }

    /// Whether a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Named default periods a KPI can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// From the first instant of the current month to now
    MonthToDate,
    /// From the first instant of the current year to now
    YearToDate,
    /// Trailing 30 days
    Last30Days,
    /// Trailing 7 days
    Last7Days,
}

impl PeriodType {
    /// Resolve the period against a reference clock
    pub fn resolve(&self, now: DateTime<Utc>) -> DateRange {
        let start = match self {
            PeriodType::MonthToDate => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
            PeriodType::YearToDate => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
            PeriodType::Last30Days => now - Duration::days(30),
            PeriodType::Last7Days => now - Duration::days(7),
        };
        DateRange { start, end: now }
    }
}

impl Default for PeriodType {
    fn default() -> Self {
        PeriodType::MonthToDate
    }
}
