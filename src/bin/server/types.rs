//! Request and Response Types for the Aula KPI HTTP Server
//!
//! This module contains all serialization/deserialization types used by the
//! HTTP API, plus the JSON envelope helpers shared by every handler.

use aula_kpi::filter::FilterDescriptor;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope: `{"success": true, "data": ...}`
pub fn ok(status: StatusCode, data: Value) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": true, "data": data })))
}

/// Error envelope: `{"success": false, "error": ...}`
///
/// `error` is a plain string for most failures; validation failures pass a
/// structured `{field, message}` object instead.
pub fn fail(status: StatusCode, error: impl Into<Value>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
}

// =============================================================================
// Admin Types
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" when the server answers at all
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

// =============================================================================
// KPI API Types
// =============================================================================

/// Body of a KPI compute request
///
/// Both bounds must be present to define an explicit period; when both are
/// absent the KPI's default period applies. Supplying only one bound is a
/// validation error.
#[derive(Debug, Default, Deserialize)]
pub struct ComputeRequest {
    /// Period start (inclusive)
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Period end (inclusive)
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Override the numerator's group_by field
    #[serde(default)]
    pub group_by: Option<String>,
    /// Override the numerator's group cap
    #[serde(default)]
    pub group_limit: Option<usize>,
}

/// Body of a chart projection request
#[derive(Debug, Default, Deserialize)]
pub struct ChartRequest {
    /// Period and grouping, same as a compute request
    #[serde(flatten)]
    pub compute: ComputeRequest,
    /// Merge the KPI's stored visual schema into the payload
    #[serde(default = "default_reuse_schema")]
    pub reuse_schema: bool,
}

fn default_reuse_schema() -> bool {
    true
}

// =============================================================================
// Model API Types
// =============================================================================

/// Body of a model query request
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    /// Filter descriptor batch
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
    /// Reject the whole batch on the first invalid descriptor instead of
    /// skipping it
    #[serde(default)]
    pub strict: bool,
}

/// Body of a multi-row insert request
#[derive(Debug, Deserialize)]
pub struct InsertRequest {
    /// Rows to insert, each a JSON object
    pub records: Vec<Value>,
}
