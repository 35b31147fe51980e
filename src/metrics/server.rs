use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use anyhow::Result;

#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<super::MetricsRegistry>,
}

/// Spawn metrics server on localhost only
pub async fn spawn_metrics_server(
    registry: Arc<super::MetricsRegistry>,
    port: u16,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = metrics_router(registry);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind metrics server on port {}: {}", port, e))?;

    tracing::info!("Metrics server listening on http://127.0.0.1:{}", port);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok(handle)
}

pub fn metrics_router(registry: Arc<super::MetricsRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { registry })
}

async fn metrics_handler(State(state): State<MetricsState>) -> Response {
    match render_metrics_internal(&state.registry.registry) {
        Ok(output) => {
            tracing::debug!("Served metrics, {} bytes", output.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
                output,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
                .into_response()
        }
    }
}

fn render_metrics_internal(registry: &prometheus::Registry) -> Result<String, anyhow::Error> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let output = encoder.encode_to_string(&metric_families)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn metrics_handler_renders_text_exposition() {
        let registry = Arc::new(super::super::MetricsRegistry::new().unwrap());
        registry.catalog_errors.inc();

        let resp = metrics_handler(State(MetricsState { registry })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("catalog_errors_total 1"));
    }
}
