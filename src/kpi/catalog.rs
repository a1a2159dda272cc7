//! KPI catalog
//!
//! Definitions live in a TOML file referenced from configuration and are
//! loaded once at startup. Lookup is by name; the catalog summary feeds the
//! cached catalog endpoint.

use crate::error::{Error, Result};
use crate::kpi::engine::KpiDefinition;
use serde::{Deserialize, Serialize};

/// Loaded set of KPI definitions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KpiCatalog {
    /// All definitions, in file order
    #[serde(default)]
    pub kpis: Vec<KpiDefinition>,
}

/// One row of the catalog listing
#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    /// KPI name
    pub name: String,
    /// Display title
    pub title: String,
    /// Numerator model
    pub model: String,
    /// Whether a denominator is configured
    pub has_denominator: bool,
    /// Default period type
    pub default_period: crate::types::PeriodType,
    /// Chart type used for projection
    pub chart_type: String,
}

impl KpiCatalog {
    /// Load a catalog from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse a catalog from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let catalog: KpiCatalog = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("bad KPI definitions: {}", e)))?;
        catalog.check_unique_names()?;
        Ok(catalog)
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<&KpiDefinition> {
        self.kpis.iter().find(|k| k.name == name)
    }

    /// Catalog listing for the REST surface
    pub fn summaries(&self) -> Vec<KpiSummary> {
        self.kpis
            .iter()
            .map(|k| KpiSummary {
                name: k.name.clone(),
                title: k.title.clone(),
                model: k.numerator.model.clone(),
                has_denominator: k.denominator.is_some(),
                default_period: k.default_period,
                chart_type: k.chart_type.clone(),
            })
            .collect()
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for kpi in &self.kpis {
            if !seen.insert(&kpi.name) {
                return Err(Error::Configuration(format!(
                    "duplicate KPI name: {}",
                    kpi.name
                )));
            }
        }
        Ok(())
    }
}
