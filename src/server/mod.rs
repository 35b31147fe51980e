//! HTTP router and listener

use crate::handlers::{self, AppState};
use anyhow::{Context, Result};
use axum::{
    routing::{delete, get},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub fn router(state: Arc<AppState>) -> Router {
    let cors_enabled = state.config.cors_enabled;
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/search", get(handlers::search))
        .route("/search/cache", delete(handlers::clear_search_cache))
        .route(
            "/search/analytics",
            get(handlers::get_search_analytics).post(handlers::post_search_analytics),
        )
        .route(
            "/properties/{id}/similar",
            get(handlers::get_similar_properties).post(handlers::post_similar_interaction),
        )
        .with_state(state);

    if cors_enabled {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind `state.config.bind_addr` and serve until `shutdown` resolves.
pub async fn serve<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
    info!(addr = %listener.local_addr().unwrap_or(addr), "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}
