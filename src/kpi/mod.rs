//! KPI aggregation
//!
//! A KPI is a named ratio of one or two aggregates over a period, times a
//! factor. This module holds the aggregate executor, the computation
//! engine, and the definition catalog.

pub mod aggregate;
pub mod catalog;
pub mod engine;

pub use aggregate::{run_aggregate, AggregateOp, AggregateResult, AggregateSpec};
pub use catalog::{KpiCatalog, KpiSummary};
pub use engine::{KpiDefinition, KpiEngine};
