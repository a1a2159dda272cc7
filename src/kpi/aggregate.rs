//! Aggregate execution
//!
//! Runs one date-bounded, filter-bounded aggregate over a model: either a
//! single scalar, or one value per distinct group key when `group_by` is
//! set. Grouped results are keyed by the stringified group value and ordered
//! ascending by key; `group_limit` caps the number of groups when positive.

use crate::error::{Error, Result, ValidationError};
use crate::store::ModelStore;
use crate::types::{DateRange, FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Supported aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    /// Row count
    Count,
    /// Sum of a numeric field
    Sum,
    /// Mean of a numeric field
    Avg,
    /// Minimum of a numeric field
    Min,
    /// Maximum of a numeric field
    Max,
}

impl AggregateOp {
    /// Parse an operation string; `None` for unrecognized operations
    ///
    /// Callers treat `None` as the documented silent no-op (result 0.0)
    /// rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "count" => Some(AggregateOp::Count),
            "sum" => Some(AggregateOp::Sum),
            "avg" | "mean" => Some(AggregateOp::Avg),
            "min" => Some(AggregateOp::Min),
            "max" => Some(AggregateOp::Max),
            _ => None,
        }
    }

    /// Whether the operation reads a value field
    pub fn needs_field(&self) -> bool {
        !matches!(self, AggregateOp::Count)
    }
}

/// Declarative spec of one aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Model to aggregate over
    pub model: String,
    /// Operation string (`count`, `sum`, `avg`, `min`, `max`)
    pub operation: String,
    /// Value field for non-count operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Timestamp field bounding the rows to the requested period
    pub date_field: String,
    /// Equality filters (field -> required value)
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    /// Group rows by this field instead of producing one scalar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    /// Cap on the number of groups returned (0 = unlimited)
    #[serde(default)]
    pub group_limit: usize,
}

/// Result of one aggregate: a scalar or a per-group mapping, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateResult {
    /// Ungrouped value
    Scalar(f64),
    /// Group key -> value, ascending by key
    ///
    /// Keys are stringified group values and order lexicographically, so
    /// numeric keys sort "1" < "10" < "2"; with `group_limit` set, the kept
    /// groups follow that string order, not numeric order. Callers needing
    /// numeric ordering must sort on their side.
    Grouped(BTreeMap<String, f64>),
}

impl AggregateResult {
    /// Scalar view; grouped results have no scalar form
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            AggregateResult::Scalar(v) => Some(*v),
            AggregateResult::Grouped(_) => None,
        }
    }

    /// Grouped view
    pub fn as_groups(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            AggregateResult::Scalar(_) => None,
            AggregateResult::Grouped(g) => Some(g),
        }
    }
}

/// Execute an aggregate spec over the store for a period
pub fn run_aggregate(
    store: &ModelStore,
    spec: &AggregateSpec,
    range: &DateRange,
) -> Result<AggregateResult> {
    let rows = store.scan(&spec.model)?;
    let rows = bound_rows(rows, spec, range);

    let op = match AggregateOp::parse(&spec.operation) {
        Some(op) => op,
        None => {
            // Documented policy: unknown operations are a silent no-op
            warn!(operation = %spec.operation, model = %spec.model,
                  "Unrecognized aggregate operation, returning 0");
            return Ok(match &spec.group_by {
                Some(_) => AggregateResult::Grouped(BTreeMap::new()),
                None => AggregateResult::Scalar(0.0),
            });
        }
    };

    if op.needs_field() && spec.field.is_none() {
        return Err(ValidationError::MissingField("field".to_string()).into());
    }

    match &spec.group_by {
        Some(group_field) => {
            let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
            for row in rows {
                let key = row.get(group_field).group_key();
                groups.entry(key).or_default().push(row);
            }

            let mut out = BTreeMap::new();
            for (key, members) in groups {
                if spec.group_limit > 0 && out.len() >= spec.group_limit {
                    break;
                }
                out.insert(key, apply_op(op, spec.field.as_deref(), &members));
            }
            Ok(AggregateResult::Grouped(out))
        }
        None => Ok(AggregateResult::Scalar(apply_op(
            op,
            spec.field.as_deref(),
            &rows,
        ))),
    }
}

/// Restrict rows to the period and the spec's equality filters
fn bound_rows(rows: Vec<Record>, spec: &AggregateSpec, range: &DateRange) -> Vec<Record> {
    let filters: Vec<(&String, FieldValue)> = spec
        .filters
        .iter()
        .map(|(k, v)| (k, FieldValue::from_json(v)))
        .collect();

    rows.into_iter()
        .filter(|row| {
            let in_range = row
                .get(&spec.date_field)
                .as_date()
                .map(|ts| range.contains(ts))
                .unwrap_or(false);
            in_range
                && filters
                    .iter()
                    .all(|(field, expected)| values_equal(row.get(field), expected))
        })
        .collect()
}

fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Apply one operation over a row set
///
/// Non-numeric/absent values are skipped for field operations. Empty inputs
/// produce 0.0 across the board, consistent with the zero-denominator and
/// unknown-operation policies.
fn apply_op(op: AggregateOp, field: Option<&str>, rows: &[Record]) -> f64 {
    if op == AggregateOp::Count {
        return rows.len() as f64;
    }

    // needs_field was checked by the caller
    let field = field.unwrap_or_default();
    let values: Vec<f64> = rows.iter().filter_map(|r| r.get(field).as_f64()).collect();
    if values.is_empty() {
        return 0.0;
    }

    match op {
        AggregateOp::Count => unreachable!(),
        AggregateOp::Sum => kahan_sum(&values),
        AggregateOp::Avg => welford_mean(&values),
        AggregateOp::Min => values
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min),
        AggregateOp::Max => values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Kahan summation for numerical stability
fn kahan_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0f64;
    let mut c = 0.0f64;
    for &v in values {
        let y = v - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }
    sum
}

/// Welford's online mean for numerical stability
fn welford_mean(values: &[f64]) -> f64 {
    let mut mean = 0.0f64;
    let mut count = 0u64;
    for &v in values {
        count += 1;
        mean += (v - mean) / count as f64;
    }
    mean
}

/// Ratio with the documented zero-denominator policy
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
