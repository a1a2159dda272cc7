//! Aula KPI - filtering, KPI aggregation, and chart projection for school records
//!
//! This library powers a reporting backend for school administration data:
//! - Declarative filter descriptors compiled into record predicates
//! - KPI definitions as aggregate ratios over configurable periods
//! - Chart payload projection with stored-schema styling merge
//! - In-memory model store with validated multi-row inserts
//!
//! The `aula-server` binary exposes these over a JSON REST API.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod kpi;
pub mod store;
pub mod types;

/// Chart payload projection
pub mod chart;

/// Catalog response caching
pub mod cache;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use error::{Error, FilterError, Result, ValidationError};
pub use filter::{apply_filters, apply_filters_strict, FilterOutcome};
pub use kpi::{KpiCatalog, KpiEngine};
pub use store::ModelStore;
pub use types::{DateRange, FieldValue, PeriodType, Record};
