//! Configuration management
//!
//! TOML configuration with environment variable overrides and sensible
//! defaults. The server looks for a config file at `AULA_CONFIG`, then
//! `./aula.toml`, then falls back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// KPI registry and catalog cache settings
    #[serde(default)]
    pub kpis: KpiSettings,

    /// Monitoring and logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// KPI settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KpiSettings {
    /// Models KPI definitions are allowed to reference
    #[serde(default = "default_available_models")]
    pub available_models: Vec<String>,

    /// Path to the TOML file holding KPI definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions_file: Option<String>,

    /// Catalog cache TTL in seconds
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_cache_ttl_secs: u64,

    /// Enable the catalog cache
    #[serde(default = "default_true")]
    pub catalog_cache_enabled: bool,

    /// Seed the demo dataset at startup
    #[serde(default = "default_true")]
    pub seed_demo_data: bool,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_available_models() -> Vec<String> {
    [
        "enrollments",
        "payments",
        "receipts",
        "attendance",
        "grades",
        "products",
        "price_lists",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_catalog_ttl_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for KpiSettings {
    fn default() -> Self {
        Self {
            available_models: default_available_models(),
            definitions_file: None,
            catalog_cache_ttl_secs: default_catalog_ttl_secs(),
            catalog_cache_enabled: true,
            seed_demo_data: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Resolve the config path and load, falling back to defaults
    ///
    /// Order: `AULA_CONFIG` env var, then `./aula.toml`, then defaults.
    pub fn load() -> Result<Self, String> {
        let mut config = if let Ok(path) = std::env::var("AULA_CONFIG") {
            Self::from_file(&path)?
        } else if std::path::Path::new("aula.toml").exists() {
            Self::from_file("aula.toml")?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("AULA_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("AULA_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(path) = std::env::var("AULA_KPI_DEFINITIONS") {
            self.kpis.definitions_file = Some(path);
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }
        if self.kpis.available_models.is_empty() {
            return Err("At least one available model is required".to_string());
        }
        if self.kpis.catalog_cache_ttl_secs == 0 && self.kpis.catalog_cache_enabled {
            return Err("Catalog cache TTL must be > 0 when the cache is enabled".to_string());
        }
        Ok(())
    }

    /// Listen address string
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.kpis.catalog_cache_enabled);
        assert!(config
            .kpis
            .available_models
            .contains(&"enrollments".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_models_rejected() {
        let mut config = Config::default();
        config.kpis.available_models.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[server]
port = 9000

[kpis]
available_models = ["payments"]
catalog_cache_ttl_secs = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.kpis.available_models, vec!["payments"]);
        assert_eq!(config.kpis.catalog_cache_ttl_secs, 10);
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_listen_addr() {
        let config = Config::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }
}
