//! Compiled filter predicates
//!
//! Compilation turns a loosely-typed [`FilterDescriptor`] into a typed
//! [`Predicate`], validating the value shape for the descriptor's type up
//! front. Evaluation is then a pure match against a record; only the
//! relation-existence predicate touches the store.

use crate::error::FilterError;
use crate::filter::descriptor::{FilterDescriptor, FilterType};
use crate::store::ModelStore;
use crate::types::{DateRange, FieldValue, Record};
use chrono::{DateTime, Utc};

/// A compiled, validated predicate
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Field equals (or differs from) a scalar
    Exact {
        /// Target field
        field: String,
        /// Comparison value
        value: FieldValue,
        /// Negated when the descriptor carried `operator: "!="`
        negated: bool,
    },
    /// Field is one of a set of scalars
    In {
        /// Target field
        field: String,
        /// Allowed values
        values: Vec<FieldValue>,
    },
    /// Field timestamp falls inside a window
    DateRange {
        /// Target field
        field: String,
        /// Inclusive window
        range: DateRange,
    },
    /// Field text contains a substring (case-insensitive)
    Text {
        /// Target field
        field: String,
        /// Lowercased needle
        needle: String,
    },
    /// Conjunction of sub-predicates
    All(Vec<Predicate>),
    /// Field is null (or non-null when `expect_null` is false)
    IsNull {
        /// Target field
        field: String,
        /// true = must be null, false = must be present
        expect_null: bool,
    },
    /// Field numeric value within bounds
    NumericRange {
        /// Target field
        field: String,
        /// Inclusive lower bound
        min: Option<f64>,
        /// Inclusive upper bound
        max: Option<f64>,
    },
    /// At least one row of a related model points at this record
    RelationExists {
        /// Related model name
        model: String,
        /// Field on the related model holding the reference
        foreign_key: String,
        /// Field on this record being referenced
        local_key: String,
        /// Extra predicates the related rows must satisfy
        filters: Vec<Predicate>,
    },
}

impl Predicate {
    /// Compile a descriptor into a predicate, validating its value shape
    pub fn compile(desc: &FilterDescriptor, store: &ModelStore) -> Result<Self, FilterError> {
        let filter_type = desc.filter_type()?;
        match filter_type {
            FilterType::Exact => compile_exact(desc),
            FilterType::In => compile_in(desc),
            FilterType::DateRange => compile_date_range(desc),
            FilterType::Text => compile_text(desc),
            FilterType::Multiple => compile_multiple(desc, store),
            FilterType::Null => compile_null(desc),
            FilterType::Range => compile_range(desc),
            FilterType::Custom => compile_custom(desc, store),
        }
    }

    /// Evaluate the predicate against a record
    pub fn matches(&self, record: &Record, store: &ModelStore) -> bool {
        match self {
            Predicate::Exact {
                field,
                value,
                negated,
            } => {
                let eq = value_eq(record.get(field), value);
                eq != *negated
            }
            Predicate::In { field, values } => {
                let actual = record.get(field);
                values.iter().any(|v| value_eq(actual, v))
            }
            Predicate::DateRange { field, range } => record
                .get(field)
                .as_date()
                .map(|ts| range.contains(ts))
                .unwrap_or(false),
            Predicate::Text { field, needle } => match record.get(field) {
                FieldValue::Text(s) => s.to_lowercase().contains(needle),
                _ => false,
            },
            Predicate::All(preds) => preds.iter().all(|p| p.matches(record, store)),
            Predicate::IsNull { field, expect_null } => {
                record.get(field).is_null() == *expect_null
            }
            Predicate::NumericRange { field, min, max } => {
                match record.get(field).as_f64() {
                    Some(n) => {
                        min.map(|m| n >= m).unwrap_or(true) && max.map(|m| n <= m).unwrap_or(true)
                    }
                    None => false,
                }
            }
            Predicate::RelationExists {
                model,
                foreign_key,
                local_key,
                filters,
            } => {
                let local = record.get(local_key);
                if local.is_null() {
                    return false;
                }
                match store.scan(model) {
                    Ok(rows) => rows.iter().any(|row| {
                        value_eq(row.get(foreign_key), local)
                            && filters.iter().all(|p| p.matches(row, store))
                    }),
                    // Relation model was checked at compile time; a miss here
                    // means it was dropped since, so nothing can match.
                    Err(_) => false,
                }
            }
        }
    }
}

/// Equality across field values, with numeric cross-type comparison
fn value_eq(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn invalid(desc: &FilterDescriptor, message: impl Into<String>) -> FilterError {
    FilterError::InvalidValue {
        field: desc.field.clone(),
        filter_type: desc.kind.clone(),
        message: message.into(),
    }
}

fn scalar_value(desc: &FilterDescriptor, value: &serde_json::Value) -> Result<FieldValue, FilterError> {
    if value.is_array() || value.is_object() {
        return Err(invalid(desc, "expected a scalar value"));
    }
    Ok(FieldValue::from_json(value))
}

fn compile_exact(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    let negated = match desc.operator.as_deref() {
        None | Some("=") | Some("==") => false,
        Some("!=") | Some("<>") => true,
        Some(op) => {
            return Err(FilterError::UnsupportedOperator {
                operator: op.to_string(),
                filter_type: desc.kind.clone(),
            })
        }
    };
    Ok(Predicate::Exact {
        field: desc.field.clone(),
        value: scalar_value(desc, &desc.value)?,
        negated,
    })
}

fn compile_in(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    let items = desc
        .value
        .as_array()
        .ok_or_else(|| invalid(desc, "expected an array of values"))?;
    let values = items
        .iter()
        .map(|v| scalar_value(desc, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Predicate::In {
        field: desc.field.clone(),
        values,
    })
}

fn parse_bound(
    desc: &FilterDescriptor,
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<DateTime<Utc>, FilterError> {
    let raw = obj
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(desc, format!("missing '{}' bound", key)))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(desc, format!("bad '{}' timestamp: {}", key, e)))
}

fn compile_date_range(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    let obj = desc
        .value
        .as_object()
        .ok_or_else(|| invalid(desc, "expected an object with 'start' and 'end'"))?;
    let start = parse_bound(desc, obj, "start")?;
    let end = parse_bound(desc, obj, "end")?;
    let range = DateRange::new(start, end).map_err(|e| invalid(desc, e))?;
    Ok(Predicate::DateRange {
        field: desc.field.clone(),
        range,
    })
}

fn compile_text(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    let needle = desc
        .value
        .as_str()
        .ok_or_else(|| invalid(desc, "expected a string"))?;
    Ok(Predicate::Text {
        field: desc.field.clone(),
        needle: needle.to_lowercase(),
    })
}

fn compile_multiple(desc: &FilterDescriptor, store: &ModelStore) -> Result<Predicate, FilterError> {
    let items = desc
        .value
        .as_array()
        .ok_or_else(|| invalid(desc, "expected an array of sub-descriptors"))?;
    let mut preds = Vec::with_capacity(items.len());
    for item in items {
        let sub: FilterDescriptor = serde_json::from_value(item.clone())
            .map_err(|e| invalid(desc, format!("bad sub-descriptor: {}", e)))?;
        preds.push(Predicate::compile(&sub, store)?);
    }
    Ok(Predicate::All(preds))
}

fn compile_null(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    // Absent or null value defaults to "must be null"
    let expect_null = match &desc.value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => *b,
        _ => return Err(invalid(desc, "expected a boolean or no value")),
    };
    Ok(Predicate::IsNull {
        field: desc.field.clone(),
        expect_null,
    })
}

fn compile_range(desc: &FilterDescriptor) -> Result<Predicate, FilterError> {
    let obj = desc
        .value
        .as_object()
        .ok_or_else(|| invalid(desc, "expected an object with 'min' and/or 'max'"))?;
    let bound = |key: &str| -> Result<Option<f64>, FilterError> {
        match obj.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(desc, format!("'{}' must be numeric", key))),
        }
    };
    let min = bound("min")?;
    let max = bound("max")?;
    if min.is_none() && max.is_none() {
        return Err(invalid(desc, "at least one of 'min'/'max' is required"));
    }
    Ok(Predicate::NumericRange {
        field: desc.field.clone(),
        min,
        max,
    })
}

fn compile_custom(desc: &FilterDescriptor, store: &ModelStore) -> Result<Predicate, FilterError> {
    let obj = desc
        .value
        .as_object()
        .ok_or_else(|| invalid(desc, "expected a relation spec object"))?;
    let model = obj
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(desc, "missing 'model'"))?;
    if !store.contains_model(model) {
        return Err(FilterError::UnknownRelation(model.to_string()));
    }
    let foreign_key = obj
        .get("foreign_key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(desc, "missing 'foreign_key'"))?;
    let local_key = obj
        .get("local_key")
        .and_then(|v| v.as_str())
        .unwrap_or("id");

    let mut filters = Vec::new();
    if let Some(raw) = obj.get("filters") {
        let items = raw
            .as_array()
            .ok_or_else(|| invalid(desc, "'filters' must be an array"))?;
        for item in items {
            let sub: FilterDescriptor = serde_json::from_value(item.clone())
                .map_err(|e| invalid(desc, format!("bad relation sub-descriptor: {}", e)))?;
            filters.push(Predicate::compile(&sub, store)?);
        }
    }

    Ok(Predicate::RelationExists {
        model: model.to_string(),
        foreign_key: foreign_key.to_string(),
        local_key: local_key.to_string(),
        filters,
    })
}
