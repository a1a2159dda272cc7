//! End-to-end tests for the filter -> aggregate -> chart pipeline
//!
//! Each test builds a seeded store, runs the full path a request handler
//! would take, and asserts on hand-computed expectations from the fixed
//! seed dataset (January 2024: 9 enrollments, 5 payments totalling 6300).

use aula_kpi::chart;
use aula_kpi::filter::{apply_filters, apply_filters_strict, FilterDescriptor};
use aula_kpi::kpi::{AggregateResult, AggregateSpec, KpiCatalog, KpiDefinition, KpiEngine};
use aula_kpi::store::{seed, ModelStore};
use aula_kpi::types::{DateRange, FieldValue, PeriodType, Record};
use aula_kpi::Error;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn seeded_engine() -> KpiEngine {
    let store = Arc::new(ModelStore::new());
    seed::seed_demo(&store);
    let models = store.model_names();
    KpiEngine::new(store, models)
}

fn january_2024() -> DateRange {
    DateRange::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
    )
    .unwrap()
}

fn count_enrollments() -> AggregateSpec {
    AggregateSpec {
        model: "enrollments".to_string(),
        operation: "count".to_string(),
        field: None,
        date_field: "enrolled_at".to_string(),
        filters: HashMap::new(),
        group_by: None,
        group_limit: 0,
    }
}

fn kpi(name: &str, numerator: AggregateSpec) -> KpiDefinition {
    KpiDefinition {
        name: name.to_string(),
        title: String::new(),
        numerator,
        denominator: None,
        factor: 1.0,
        default_period: PeriodType::MonthToDate,
        chart_type: "bar".to_string(),
        chart_schema: None,
    }
}

#[test]
fn enrollment_count_over_january_is_raw_count() {
    let engine = seeded_engine();
    let def = kpi("enrollment_count", count_enrollments());

    let value = engine.compute(&def, &january_2024()).unwrap();
    assert_eq!(value, AggregateResult::Scalar(9.0));
}

#[test]
fn missing_denominator_means_numerator_times_factor() {
    let engine = seeded_engine();
    let mut def = kpi("scaled_enrollments", count_enrollments());
    def.factor = 10.0;

    let value = engine.compute(&def, &january_2024()).unwrap();
    assert_eq!(value, AggregateResult::Scalar(90.0));
}

#[test]
fn zero_denominator_yields_zero_not_error() {
    let engine = seeded_engine();
    let mut def = kpi("ratio_vs_empty", count_enrollments());
    // Receipts carry no date field, so nothing falls inside the range
    def.denominator = Some(AggregateSpec {
        model: "receipts".to_string(),
        operation: "count".to_string(),
        field: None,
        date_field: "created_at".to_string(),
        filters: HashMap::new(),
        group_by: None,
        group_limit: 0,
    });

    let value = engine.compute(&def, &january_2024()).unwrap();
    assert_eq!(value, AggregateResult::Scalar(0.0));
}

#[test]
fn grouped_count_respects_limit_and_ordering() {
    let engine = seeded_engine();
    let mut spec = count_enrollments();
    spec.group_by = Some("sede_id".to_string());
    spec.group_limit = 2;
    let def = kpi("enrollments_by_sede", spec);

    let value = engine.compute(&def, &january_2024()).unwrap();
    let groups = value.as_groups().unwrap();

    // Three campuses have January activity; the cap keeps the two lowest
    // keys in ascending stringified order
    let keys: Vec<&String> = groups.keys().collect();
    assert_eq!(keys, vec!["1", "2"]);
    assert_eq!(groups["1"], 5.0);
    assert_eq!(groups["2"], 3.0);
}

#[test]
fn revenue_sum_matches_seeded_payments() {
    let engine = seeded_engine();
    let def = kpi(
        "revenue",
        AggregateSpec {
            model: "payments".to_string(),
            operation: "sum".to_string(),
            field: Some("amount".to_string()),
            date_field: "paid_at".to_string(),
            filters: HashMap::new(),
            group_by: None,
            group_limit: 0,
        },
    );

    let value = engine.compute(&def, &january_2024()).unwrap();
    // 1500 + 1500 + 1200 + 1200 + 900, February payment excluded
    assert_eq!(value, AggregateResult::Scalar(6300.0));
}

#[test]
fn unconfigured_model_is_rejected_with_configuration_error() {
    let store = Arc::new(ModelStore::new());
    seed::seed_demo(&store);
    let engine = KpiEngine::new(store, vec!["payments".to_string()]);

    let def = kpi("enrollment_count", count_enrollments());
    let err = engine.compute(&def, &january_2024()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

// =============================================================================
// Filter pipeline
// =============================================================================

#[test]
fn bogus_descriptor_skips_only_itself() {
    let engine = seeded_engine();
    let store = engine.store();
    let rows = store.scan("enrollments").unwrap();

    let batch = vec![
        FilterDescriptor::new("id", "bogus", json!(1)),
        FilterDescriptor::new("status", "exact", json!("active")),
    ];

    let outcome = apply_filters(rows, &batch, store);
    assert_eq!(outcome.skipped, 1);
    // 10 seeded enrollments, one cancelled
    assert_eq!(outcome.records.len(), 9);
}

#[test]
fn malformed_values_are_validation_failures_in_strict_mode() {
    let engine = seeded_engine();
    let store = engine.store();

    // `in` requires an array value
    let non_array = vec![FilterDescriptor::new("sede_id", "in", json!(2))];
    let rows = store.scan("enrollments").unwrap();
    assert!(apply_filters_strict(rows, &non_array, store).is_err());

    // `date_range` requires both bounds
    let half_range = vec![FilterDescriptor::new(
        "enrolled_at",
        "date_range",
        json!({ "start": "2024-01-01T00:00:00Z" }),
    )];
    let rows = store.scan("enrollments").unwrap();
    assert!(apply_filters_strict(rows, &half_range, store).is_err());
}

#[test]
fn filtered_rows_feed_grouped_aggregation() {
    let engine = seeded_engine();
    let mut spec = count_enrollments();
    spec.filters
        .insert("status".to_string(), json!("active"));
    spec.group_by = Some("sede_id".to_string());
    let def = kpi("active_by_sede", spec);

    let value = engine.compute(&def, &january_2024()).unwrap();
    let groups = value.as_groups().unwrap();
    // Sede 1 has one cancelled enrollment in January
    assert_eq!(groups["1"], 4.0);
    assert_eq!(groups["2"], 3.0);
    assert_eq!(groups["3"], 1.0);
}

// =============================================================================
// Chart projection
// =============================================================================

#[test]
fn chart_payload_always_carries_fresh_data() {
    let engine = seeded_engine();
    let mut spec = count_enrollments();
    spec.group_by = Some("sede_id".to_string());
    let mut def = kpi("enrollments_by_sede", spec);
    def.chart_schema = Some(json!({
        "colors": ["#123456"],
        "categories": ["stale-x", "stale-y"],
        "series": [{ "name": "Stored", "type": "pie", "data": [99.0, 98.0] }]
    }));

    let value = engine.compute(&def, &january_2024()).unwrap();
    let payload = chart::project(&def, &value, true);

    // Styling survives the merge
    assert_eq!(payload["colors"], json!(["#123456"]));
    assert_eq!(payload["series"][0]["name"], json!("Stored"));

    // Data never does
    assert_eq!(payload["categories"], json!(["1", "2", "3"]));
    assert_eq!(payload["series"][0]["data"], json!([5.0, 3.0, 1.0]));
    assert_eq!(
        payload["categories"].as_array().unwrap().len(),
        payload["series"][0]["data"].as_array().unwrap().len()
    );
}

#[test]
fn scalar_chart_uses_kpi_name_as_category() {
    let engine = seeded_engine();
    let def = kpi("enrollment_count", count_enrollments());

    let value = engine.compute(&def, &january_2024()).unwrap();
    let payload = chart::project(&def, &value, false);

    assert_eq!(payload["categories"], json!(["enrollment_count"]));
    assert_eq!(payload["series"][0]["data"], json!([9.0]));
}

// =============================================================================
// Catalog + store behavior
// =============================================================================

#[test]
fn catalog_definitions_compute_end_to_end() {
    let toml = r#"
[[kpis]]
name = "cancellation_rate"
title = "Cancellation Rate"
factor = 100.0

[kpis.numerator]
model = "enrollments"
operation = "count"
date_field = "enrolled_at"
filters = { status = "cancelled" }

[kpis.denominator]
model = "enrollments"
operation = "count"
date_field = "enrolled_at"
"#;
    let catalog = KpiCatalog::from_toml(toml).unwrap();
    let engine = seeded_engine();

    let def = catalog.get("cancellation_rate").unwrap();
    let value = engine.compute(def, &january_2024()).unwrap();
    // 1 cancelled of 9 January enrollments, as a percentage
    match value {
        AggregateResult::Scalar(v) => assert!((v - 100.0 / 9.0).abs() < 1e-9),
        other => panic!("expected scalar, got {:?}", other),
    }
}

#[test]
fn multi_row_insert_is_all_or_nothing() {
    let store = ModelStore::new();
    seed::register_models(&store);

    let batch = vec![
        Record::new()
            .with("id", FieldValue::Int(1))
            .with("name", FieldValue::Text("Tuition".to_string()))
            .with("price", FieldValue::Float(1200.0)),
        // Missing required "price"
        Record::new()
            .with("id", FieldValue::Int(2))
            .with("name", FieldValue::Text("Uniform".to_string())),
    ];

    let err = store.insert_many("products", batch).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(store.count("products").unwrap(), 0);

    let good = vec![
        Record::new()
            .with("id", FieldValue::Int(1))
            .with("name", FieldValue::Text("Tuition".to_string()))
            .with("price", FieldValue::Float(1200.0)),
        Record::new()
            .with("id", FieldValue::Int(2))
            .with("name", FieldValue::Text("Uniform".to_string()))
            .with("price", FieldValue::Float(350.0)),
    ];
    assert_eq!(store.insert_many("products", good).unwrap(), 2);
    assert_eq!(store.count("products").unwrap(), 2);
}

#[test]
fn unknown_operation_is_a_silent_zero() {
    let engine = seeded_engine();
    let mut spec = count_enrollments();
    spec.operation = "median".to_string();
    let def = kpi("median_enrollments", spec);

    let value = engine.compute(&def, &january_2024()).unwrap();
    assert_eq!(value, AggregateResult::Scalar(0.0));
}
