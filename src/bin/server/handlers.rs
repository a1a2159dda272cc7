//! HTTP Handlers for the Aula KPI Server
//!
//! This module contains all HTTP endpoint handlers for the REST API.
//!
//! # Error mapping
//!
//! Domain errors are translated at this boundary and nowhere else:
//! validation and filter errors become 422, unknown KPIs and models 404,
//! incomplete KPI configuration 400. Anything infrastructural is logged and
//! reduced to a generic 500 so internals never leak into a response.

use super::types::*;
use aula_kpi::cache::CatalogCache;
use aula_kpi::config::Config;
use aula_kpi::error::Error;
use aula_kpi::filter::{apply_filters, apply_filters_strict};
use aula_kpi::kpi::{KpiCatalog, KpiDefinition, KpiEngine};
use aula_kpi::types::{DateRange, Record};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state: the engine, the loaded catalog, and counters
pub struct AppState {
    /// KPI computation engine over the record store
    pub engine: KpiEngine,
    /// Loaded KPI definitions
    pub catalog: KpiCatalog,
    /// TTL cache for the catalog listing payload
    pub catalog_cache: CatalogCache,
    /// Server configuration
    pub config: Config,
    /// Total requests served
    pub requests: AtomicU64,
}

impl AppState {
    fn bump(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn find_kpi(&self, name: &str) -> Option<&KpiDefinition> {
        self.catalog.get(name)
    }
}

/// Map a domain error onto a status code and client-facing error payload
///
/// Validation errors keep their field-level structure; everything else is a
/// plain message.
fn map_error(err: &Error) -> (StatusCode, Value) {
    match err {
        Error::Validation(v) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "field": v.field(), "message": v.to_string() }),
        ),
        Error::Filter(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Value::String(err.to_string()),
        ),
        Error::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Value::String(format!("{} not found", what)),
        ),
        Error::Configuration(msg) => (StatusCode::BAD_REQUEST, Value::String(msg.clone())),
        other => {
            error!(error = %other, "Internal error while handling request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::String("Internal server error".to_string()),
            )
        }
    }
}

/// Resolve the requested period against a definition
///
/// Explicit bounds must come in pairs; a lone bound is rejected rather than
/// silently widened.
fn resolve_range(
    state: &AppState,
    def: &KpiDefinition,
    req: &ComputeRequest,
) -> Result<DateRange, (StatusCode, Json<Value>)> {
    match (req.start, req.end) {
        (Some(start), Some(end)) => DateRange::new(start, end)
            .map_err(|e| fail(StatusCode::UNPROCESSABLE_ENTITY, e)),
        (None, None) => Ok(state.engine.resolve_period(def, None)),
        _ => Err(fail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "period requires both start and end",
        )),
    }
}

/// Apply per-request grouping overrides to a definition
fn with_overrides(def: &KpiDefinition, req: &ComputeRequest) -> KpiDefinition {
    let mut def = def.clone();
    if let Some(group_by) = &req.group_by {
        def.numerator.group_by = Some(group_by.clone());
    }
    if let Some(limit) = req.group_limit {
        def.numerator.group_limit = limit;
    }
    def
}

// =============================================================================
// Health & Metrics Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    state.bump();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Plain-text counters in Prometheus exposition format
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.bump();
    let store = state.engine.store();
    let total_rows: usize = store
        .model_names()
        .iter()
        .filter_map(|m| store.count(m).ok())
        .sum();

    let mut out = String::new();
    out.push_str("# HELP aula_requests_total Total HTTP requests served\n");
    out.push_str("# TYPE aula_requests_total counter\n");
    out.push_str(&format!(
        "aula_requests_total {}\n",
        state.requests.load(Ordering::Relaxed)
    ));
    out.push_str("# HELP aula_catalog_cache_hits_total Catalog cache hits\n");
    out.push_str("# TYPE aula_catalog_cache_hits_total counter\n");
    out.push_str(&format!(
        "aula_catalog_cache_hits_total {}\n",
        state.catalog_cache.hits()
    ));
    out.push_str("# HELP aula_catalog_cache_misses_total Catalog cache misses\n");
    out.push_str("# TYPE aula_catalog_cache_misses_total counter\n");
    out.push_str(&format!(
        "aula_catalog_cache_misses_total {}\n",
        state.catalog_cache.misses()
    ));
    out.push_str("# HELP aula_kpis_defined Number of loaded KPI definitions\n");
    out.push_str("# TYPE aula_kpis_defined gauge\n");
    out.push_str(&format!("aula_kpis_defined {}\n", state.catalog.kpis.len()));
    out.push_str("# HELP aula_store_rows Total rows across all models\n");
    out.push_str("# TYPE aula_store_rows gauge\n");
    out.push_str(&format!("aula_store_rows {}\n", total_rows));
    out
}

/// Drop the cached catalog payload
///
/// Admin escape hatch for operators who edited the definitions file behind a
/// running server and do not want to wait out the TTL.
pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    state.bump();
    state.catalog_cache.invalidate();
    ok(StatusCode::OK, json!({ "invalidated": true }))
}

// =============================================================================
// KPI Handlers
// =============================================================================

/// List the KPI catalog, served through the TTL cache
pub async fn list_kpis(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    state.bump();
    let payload = state
        .catalog_cache
        .get_or_insert_with(|| json!(state.catalog.summaries()));
    ok(StatusCode::OK, payload)
}

/// Fetch one KPI definition by name
pub async fn get_kpi(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.bump();
    match state.find_kpi(&name) {
        Some(def) => ok(StatusCode::OK, json!(def)),
        None => fail(StatusCode::NOT_FOUND, format!("KPI '{}' not found", name)),
    }
}

/// Compute a KPI value over a period
pub async fn compute_kpi(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<ComputeRequest>,
) -> (StatusCode, Json<Value>) {
    state.bump();
    let Some(def) = state.find_kpi(&name) else {
        return fail(StatusCode::NOT_FOUND, format!("KPI '{}' not found", name));
    };

    let range = match resolve_range(&state, def, &req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let def = with_overrides(def, &req);

    match state.engine.compute(&def, &range) {
        Ok(value) => ok(
            StatusCode::OK,
            json!({
                "name": def.name,
                "period": { "start": range.start, "end": range.end },
                "value": value,
            }),
        ),
        Err(e) => {
            let (status, message) = map_error(&e);
            fail(status, message)
        }
    }
}

/// Compute a KPI and project it into a chart payload
pub async fn chart_kpi(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<ChartRequest>,
) -> (StatusCode, Json<Value>) {
    state.bump();
    let Some(def) = state.find_kpi(&name) else {
        return fail(StatusCode::NOT_FOUND, format!("KPI '{}' not found", name));
    };

    let range = match resolve_range(&state, def, &req.compute) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let def = with_overrides(def, &req.compute);

    match state.engine.compute(&def, &range) {
        Ok(value) => {
            let payload = aula_kpi::chart::project(&def, &value, req.reuse_schema);
            ok(StatusCode::OK, payload)
        }
        Err(e) => {
            let (status, message) = map_error(&e);
            fail(status, message)
        }
    }
}

// =============================================================================
// Model Handlers
// =============================================================================

/// Run a filter-descriptor batch against a model
pub async fn query_model(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<Value>) {
    state.bump();
    let store = state.engine.store();
    let rows = match store.scan(&model) {
        Ok(rows) => rows,
        Err(e) => {
            let (status, message) = map_error(&e);
            return fail(status, message);
        }
    };

    if req.strict {
        match apply_filters_strict(rows, &req.filters, store) {
            Ok(records) => ok(
                StatusCode::OK,
                json!({ "count": records.len(), "records": records, "skipped": 0 }),
            ),
            Err(e) => fail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        }
    } else {
        let outcome = apply_filters(rows, &req.filters, store);
        ok(
            StatusCode::OK,
            json!({
                "count": outcome.records.len(),
                "records": outcome.records,
                "skipped": outcome.skipped,
            }),
        )
    }
}

/// Atomic multi-row insert into a model
pub async fn insert_records(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    Json(req): Json<InsertRequest>,
) -> (StatusCode, Json<Value>) {
    state.bump();

    let mut records = Vec::with_capacity(req.records.len());
    for (i, value) in req.records.iter().enumerate() {
        match value.as_object() {
            Some(obj) => records.push(Record::from_json(obj)),
            None => {
                return fail(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("records[{}] is not an object", i),
                )
            }
        }
    }

    match state.engine.store().insert_many(&model, records) {
        Ok(written) => ok(StatusCode::CREATED, json!({ "inserted": written })),
        Err(e) => {
            let (status, message) = map_error(&e);
            fail(status, message)
        }
    }
}

/// PDF export stub
///
/// Receipt rendering is handled by a separate document service; this
/// endpoint only reserves the route.
pub async fn receipt_pdf(
    State(state): State<Arc<AppState>>,
    Path(_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.bump();
    fail(StatusCode::NOT_IMPLEMENTED, "PDF export not available")
}
