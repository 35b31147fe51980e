use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use property_search_engine::catalog::SqliteCatalog;
use property_search_engine::cli::{print_help, print_version, wants_help, wants_version};
use property_search_engine::clock::SystemClock;
use property_search_engine::config::Config;
use property_search_engine::handlers::AppState;
use property_search_engine::metrics::spawn_metrics_server;
use property_search_engine::{server, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if wants_help(&args) {
        print_help();
        return Ok(());
    }
    if wants_version(&args) {
        print_version();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting property-search-engine"
    );

    if let Err(err) = run().await {
        error!(error = %err, "Server exited with error");
        return Err(err);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    info!(
        catalog_db_path = %config.catalog_db_path.display(),
        bind_addr = %config.bind_addr,
        cors_enabled = config.cors_enabled,
        query_cache_max_entries = config.query_cache_max_entries.get(),
        query_cache_ttl_secs = config.query_cache_ttl_secs,
        recommendation_cache_max_entries = config.recommendation_cache_max_entries.get(),
        recommendation_cache_ttl_secs = config.recommendation_cache_ttl_secs,
        eviction_interval_secs = config.eviction_interval_secs,
        candidate_pool_size = config.candidate_pool_size,
        personalization_blend = config.personalization_blend,
        metrics_enabled = config.metrics_enabled,
        "Loaded config"
    );

    let catalog = SqliteCatalog::open(&config.catalog_db_path)
        .context("Failed to open property catalog")?;

    let engine = Arc::new(Engine::new(
        config,
        Arc::new(catalog),
        Arc::new(SystemClock),
    )?);
    engine.init();

    let metrics_handle = if engine.config().metrics_enabled {
        match spawn_metrics_server(engine.metrics(), engine.config().metrics_port).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "Metrics server disabled");
                None
            }
        }
    } else {
        None
    };

    let state = Arc::new(AppState::new(engine.clone()));
    let served = server::serve(state, shutdown_signal()).await;

    engine.shutdown().await;
    if let Some(handle) = metrics_handle {
        handle.abort();
    }
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
