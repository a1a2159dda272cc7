//! Aula KPI HTTP Server
//!
//! This binary exposes the filtering, KPI aggregation, and chart projection
//! pipeline over a JSON REST API.
//!
//! # Endpoints
//!
//! ## KPIs
//! - `GET /api/v1/kpis` - KPI catalog (cached)
//! - `GET /api/v1/kpis/:name` - One KPI definition
//! - `POST /api/v1/kpis/:name/compute` - Compute a KPI value over a period
//! - `POST /api/v1/kpis/:name/chart` - Compute and project a chart payload
//!
//! ## Models
//! - `POST /api/v1/models/:model/query` - Filter-descriptor batch query
//! - `POST /api/v1/models/:model/records` - Atomic multi-row insert
//!
//! ## Documents
//! - `POST /api/v1/receipts/:id/pdf` - Stub, always 501
//!
//! ## Admin
//! - `GET /health` - Health check
//! - `GET /metrics` - Plain-text counters
//! - `POST /api/v1/cache/invalidate` - Drop the cached catalog payload
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration and KPI definitions
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `AULA_CONFIG` environment variable (path to TOML file)
//! 2. `./aula.toml` in current directory
//! 3. Default configuration

mod handlers;
mod types;

use aula_kpi::cache::{CacheConfig, CatalogCache};
use aula_kpi::config::Config;
use aula_kpi::kpi::{KpiCatalog, KpiEngine};
use aula_kpi::store::{seed, ModelStore};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use handlers::AppState;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// =============================================================================
// Router and Server Setup
// =============================================================================

/// Build CORS layer from configuration
fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Build the application router
fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_allowed_origins);
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/v1/cache/invalidate",
            post(handlers::invalidate_cache),
        )
        // KPI API
        .route("/api/v1/kpis", get(handlers::list_kpis))
        .route("/api/v1/kpis/:name", get(handlers::get_kpi))
        .route("/api/v1/kpis/:name/compute", post(handlers::compute_kpi))
        .route("/api/v1/kpis/:name/chart", post(handlers::chart_kpi))
        // Model API
        .route("/api/v1/models/:model/query", post(handlers::query_model))
        .route(
            "/api/v1/models/:model/records",
            post(handlers::insert_records),
        )
        // Documents
        .route("/api/v1/receipts/:id/pdf", post(handlers::receipt_pdf))
        // State and CORS
        .with_state(state)
        .layer(cors)
}

/// Graceful shutdown signal handler
///
/// Handles signal registration failures by logging a warning and waiting
/// indefinitely (the server must then be killed forcefully), which beats
/// panicking during startup.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// State Construction
// =============================================================================

/// Load the KPI catalog referenced from configuration
///
/// Falls back to `./kpis.toml` when the config names no file, and to an
/// empty catalog when neither exists.
fn load_catalog(config: &Config) -> Result<KpiCatalog, Box<dyn std::error::Error>> {
    if let Some(path) = &config.kpis.definitions_file {
        return Ok(KpiCatalog::from_file(path)?);
    }
    if std::path::Path::new("kpis.toml").exists() {
        return Ok(KpiCatalog::from_file("kpis.toml")?);
    }
    warn!("No KPI definitions file found, starting with an empty catalog");
    Ok(KpiCatalog::default())
}

/// Build the shared application state from configuration
fn build_state(config: Config) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    let store = Arc::new(ModelStore::new());
    seed::register_models(&store);
    if config.kpis.seed_demo_data {
        seed::seed_demo(&store);
        info!("Seeded demo dataset");
    }

    let catalog = load_catalog(&config)?;
    info!(kpis = catalog.kpis.len(), "Loaded KPI catalog");

    let engine = KpiEngine::new(store, config.kpis.available_models.clone());
    let catalog_cache = CatalogCache::new(CacheConfig {
        ttl: Duration::from_secs(config.kpis.catalog_cache_ttl_secs),
        enabled: config.kpis.catalog_cache_enabled,
    });

    Ok(Arc::new(AppState {
        engine,
        catalog,
        catalog_cache,
        config,
        requests: AtomicU64::new(0),
    }))
}

// =============================================================================
// CLI Definition
// =============================================================================

/// Aula KPI - filtering, aggregation, and chart projection server
#[derive(Parser)]
#[command(name = "aula-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,
    /// Validate configuration and KPI definitions, then exit
    CheckConfig,
}

// =============================================================================
// Entry Point
// =============================================================================

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen_addr();
    let state = build_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Aula KPI server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn check_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let catalog = load_catalog(config)?;
    for kpi in &catalog.kpis {
        if !config
            .kpis
            .available_models
            .iter()
            .any(|m| m == &kpi.numerator.model)
        {
            warn!(
                kpi = %kpi.name,
                model = %kpi.numerator.model,
                "KPI references a model outside the configured registry"
            );
        }
    }
    println!(
        "Configuration OK: {} KPIs, {} available models",
        catalog.kpis.len(),
        config.kpis.available_models.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config.monitoring.log_level);

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => run_server(config).await,
        Commands::CheckConfig => check_config(&config),
    }
}
