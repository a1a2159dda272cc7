//! KPI computation engine
//!
//! A KPI is a ratio of one or two aggregates times a factor. The engine
//! resolves the period, checks the definition against the configured model
//! registry, runs numerator and denominator, and derives the final value
//! with the documented numeric policies (implicit denominator 1, zero
//! denominator yields 0).

use crate::error::{Error, Result};
use crate::kpi::aggregate::{run_aggregate, safe_ratio, AggregateResult, AggregateSpec};
use crate::store::ModelStore;
use crate::types::{DateRange, PeriodType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stored definition of one KPI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiDefinition {
    /// Unique name, used in URLs
    pub name: String,
    /// Human-readable title for chart headers
    #[serde(default)]
    pub title: String,
    /// Numerator aggregate
    pub numerator: AggregateSpec,
    /// Optional denominator aggregate; absent means implicit denominator 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<AggregateSpec>,
    /// Multiplier applied to the ratio (e.g. 100 for percentages)
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Period used when a compute request carries no explicit range
    #[serde(default)]
    pub default_period: PeriodType,
    /// Chart type for projection ("line", "bar", "pie", ...)
    #[serde(default = "default_chart_type")]
    pub chart_type: String,
    /// Stored visual schema, merged into projections on request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_schema: Option<serde_json::Value>,
}

fn default_factor() -> f64 {
    1.0
}

fn default_chart_type() -> String {
    "line".to_string()
}

/// Computes KPI values against a store and a model registry
pub struct KpiEngine {
    store: Arc<ModelStore>,
    /// Models KPI definitions may reference, from configuration
    available_models: Vec<String>,
}

impl KpiEngine {
    /// Create an engine over a store with the configured model registry
    pub fn new(store: Arc<ModelStore>, available_models: Vec<String>) -> Self {
        Self {
            store,
            available_models,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Resolve the period for a definition: explicit range or default period
    pub fn resolve_period(&self, def: &KpiDefinition, range: Option<DateRange>) -> DateRange {
        range.unwrap_or_else(|| def.default_period.resolve(Utc::now()))
    }

    /// Compute a KPI over a period
    ///
    /// Grouped numerators produce a grouped value; the denominator is always
    /// reduced to a scalar and applied to every group.
    pub fn compute(&self, def: &KpiDefinition, range: &DateRange) -> Result<AggregateResult> {
        self.check_configured(def)?;

        let numerator = run_aggregate(&self.store, &def.numerator, range)?;
        let denominator = match &def.denominator {
            Some(spec) => {
                // Force the denominator to a scalar; group alignment between
                // two grouped aggregates is undefined.
                let mut scalar_spec = spec.clone();
                scalar_spec.group_by = None;
                run_aggregate(&self.store, &scalar_spec, range)?
                    .as_scalar()
                    .unwrap_or(0.0)
            }
            None => 1.0,
        };

        Ok(match numerator {
            AggregateResult::Scalar(n) => {
                AggregateResult::Scalar(safe_ratio(n, denominator) * def.factor)
            }
            AggregateResult::Grouped(groups) => {
                let scaled: BTreeMap<String, f64> = groups
                    .into_iter()
                    .map(|(k, n)| (k, safe_ratio(n, denominator) * def.factor))
                    .collect();
                AggregateResult::Grouped(scaled)
            }
        })
    }

    /// Verify the definition can run against the configured registry
    fn check_configured(&self, def: &KpiDefinition) -> Result<()> {
        let mut models = vec![&def.numerator.model];
        if let Some(d) = &def.denominator {
            models.push(&d.model);
        }
        for model in models {
            if !self.available_models.iter().any(|m| m == model) {
                return Err(Error::Configuration(format!(
                    "KPI '{}' not fully configured: model '{}' is not available",
                    def.name, model
                )));
            }
        }
        Ok(())
    }
}
