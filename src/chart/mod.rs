//! Chart Projector
//!
//! Maps an aggregate result into a generic chart payload (categories +
//! series + presentation keys), optionally merged with a KPI's stored
//! visual schema.
//!
//! # The merge rule
//!
//! A stored schema contributes *styling only*. Whatever it carries, the
//! projected payload's `categories` and every `series[i].data` are always
//! rewritten from the freshly computed result, so a stale cached series can
//! never leak into a live response.

use crate::kpi::aggregate::AggregateResult;
use crate::kpi::engine::KpiDefinition;
use serde_json::{json, Map, Value};

/// Freshly computed chart axes: categories and one value per category
#[derive(Debug, Clone, PartialEq)]
pub struct FreshSeries {
    /// Category labels (group keys, or the KPI name for scalars)
    pub categories: Vec<String>,
    /// One value per category
    pub data: Vec<f64>,
}

impl FreshSeries {
    /// Derive categories/data from an aggregate result
    pub fn from_result(def: &KpiDefinition, result: &AggregateResult) -> Self {
        match result {
            AggregateResult::Scalar(v) => Self {
                categories: vec![def.name.clone()],
                data: vec![*v],
            },
            AggregateResult::Grouped(groups) => Self {
                categories: groups.keys().cloned().collect(),
                data: groups.values().copied().collect(),
            },
        }
    }
}

/// Project a computed result into a chart payload
///
/// When `reuse_schema` is set and the definition stores a visual schema, its
/// keys are merged over the baseline before the fresh data is reapplied.
pub fn project(def: &KpiDefinition, result: &AggregateResult, reuse_schema: bool) -> Value {
    let fresh = FreshSeries::from_result(def, result);
    let baseline = baseline_payload(def, &fresh);

    match (&def.chart_schema, reuse_schema) {
        (Some(stored), true) => merge_with_schema(baseline, stored, def, &fresh),
        _ => baseline,
    }
}

/// Baseline payload driven purely by fresh values
fn baseline_payload(def: &KpiDefinition, fresh: &FreshSeries) -> Value {
    let title = if def.title.is_empty() {
        &def.name
    } else {
        &def.title
    };
    json!({
        "title": { "text": title },
        "categories": fresh.categories,
        "series": [{
            "name": title,
            "type": def.chart_type,
            "data": fresh.data,
        }],
        "legend": { "show": true },
        "axis": { "x": { "type": "category" }, "y": { "type": "value" } },
    })
}

/// Merge stored styling over the baseline, then reapply fresh data
fn merge_with_schema(
    baseline: Value,
    stored: &Value,
    def: &KpiDefinition,
    fresh: &FreshSeries,
) -> Value {
    let mut merged = match baseline {
        Value::Object(m) => m,
        _ => Map::new(),
    };

    if let Value::Object(stored_map) = stored {
        for (key, value) in stored_map {
            merged.insert(key.clone(), value.clone());
        }
    }

    // Fresh data always wins over anything the stored schema carried
    merged.insert("categories".to_string(), json!(fresh.categories));

    let series = rebuild_series(merged.remove("series"), def, fresh);
    merged.insert("series".to_string(), series);

    Value::Object(merged)
}

/// Keep per-series styling from the merged payload, overwrite its data
///
/// The projector emits exactly one series; extra stored series entries are
/// dropped rather than served with stale data.
fn rebuild_series(merged_series: Option<Value>, def: &KpiDefinition, fresh: &FreshSeries) -> Value {
    let mut entry = merged_series
        .and_then(|s| match s {
            Value::Array(mut items) if !items.is_empty() => Some(items.remove(0)),
            _ => None,
        })
        .and_then(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        })
        .unwrap_or_default();

    entry
        .entry("name".to_string())
        .or_insert_with(|| json!(if def.title.is_empty() { &def.name } else { &def.title }));
    entry
        .entry("type".to_string())
        .or_insert_with(|| json!(def.chart_type));
    entry.insert("data".to_string(), json!(fresh.data));

    json!([Value::Object(entry)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::aggregate::AggregateSpec;
    use crate::types::PeriodType;
    use std::collections::{BTreeMap, HashMap};

    fn definition(schema: Option<Value>) -> KpiDefinition {
        KpiDefinition {
            name: "revenue".to_string(),
            title: "Revenue".to_string(),
            numerator: AggregateSpec {
                model: "payments".to_string(),
                operation: "sum".to_string(),
                field: Some("amount".to_string()),
                date_field: "paid_at".to_string(),
                filters: HashMap::new(),
                group_by: None,
                group_limit: 0,
            },
            denominator: None,
            factor: 1.0,
            default_period: PeriodType::MonthToDate,
            chart_type: "bar".to_string(),
            chart_schema: schema,
        }
    }

    fn grouped() -> AggregateResult {
        let mut groups = BTreeMap::new();
        groups.insert("1".to_string(), 3000.0);
        groups.insert("2".to_string(), 2400.0);
        AggregateResult::Grouped(groups)
    }

    #[test]
    fn test_baseline_from_grouped_result() {
        let def = definition(None);
        let payload = project(&def, &grouped(), false);

        assert_eq!(payload["categories"], json!(["1", "2"]));
        assert_eq!(payload["series"][0]["data"], json!([3000.0, 2400.0]));
        assert_eq!(payload["series"][0]["type"], json!("bar"));
        assert_eq!(payload["title"]["text"], json!("Revenue"));
        // data length always equals categories length
        assert_eq!(
            payload["categories"].as_array().unwrap().len(),
            payload["series"][0]["data"].as_array().unwrap().len()
        );
    }

    #[test]
    fn test_baseline_from_scalar_result() {
        let def = definition(None);
        let payload = project(&def, &AggregateResult::Scalar(5400.0), false);

        assert_eq!(payload["categories"], json!(["revenue"]));
        assert_eq!(payload["series"][0]["data"], json!([5400.0]));
    }

    #[test]
    fn test_stored_schema_styling_merged_data_fresh() {
        let stored = json!({
            "legend": { "show": false, "position": "bottom" },
            "colors": ["#336699"],
            "categories": ["stale-a", "stale-b", "stale-c"],
            "series": [{
                "name": "Cached name",
                "type": "pie",
                "data": [1.0, 2.0, 3.0],
                "stack": "total"
            }]
        });
        let def = definition(Some(stored));
        let payload = project(&def, &grouped(), true);

        // Styling keys come from the stored schema
        assert_eq!(payload["legend"]["position"], json!("bottom"));
        assert_eq!(payload["colors"], json!(["#336699"]));
        assert_eq!(payload["series"][0]["stack"], json!("total"));
        assert_eq!(payload["series"][0]["name"], json!("Cached name"));

        // But data and categories are always the fresh computation
        assert_eq!(payload["categories"], json!(["1", "2"]));
        assert_eq!(payload["series"][0]["data"], json!([3000.0, 2400.0]));
    }

    #[test]
    fn test_schema_ignored_when_reuse_disabled() {
        let stored = json!({ "colors": ["#000000"], "categories": ["stale"] });
        let def = definition(Some(stored));
        let payload = project(&def, &grouped(), false);

        assert!(payload.get("colors").is_none());
        assert_eq!(payload["categories"], json!(["1", "2"]));
    }

    #[test]
    fn test_extra_stored_series_dropped() {
        let stored = json!({
            "series": [
                { "name": "first", "data": [9.0] },
                { "name": "stale-second", "data": [8.0] }
            ]
        });
        let def = definition(Some(stored));
        let payload = project(&def, &grouped(), true);

        let series = payload["series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["data"], json!([3000.0, 2400.0]));
    }

    #[test]
    fn test_schema_with_empty_series_keeps_baseline_shape() {
        let stored = json!({ "series": [] });
        let def = definition(Some(stored));
        let payload = project(&def, &grouped(), true);

        assert_eq!(payload["series"][0]["type"], json!("bar"));
        assert_eq!(payload["series"][0]["data"], json!([3000.0, 2400.0]));
    }
}
