//! HTTP handlers

use crate::analytics::SearchAnalyticsEvent;
use crate::error::EngineError;
use crate::recommend::InteractionType;
use crate::search::RawSearchFilters;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub use state::AppState;

mod state;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarParams {
    pub limit: Option<String>,
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
}

impl SimilarParams {
    /// Parsed `limit`; blank means absent. Range checks happen in the service.
    pub fn limit(&self) -> Result<Option<usize>, EngineError> {
        let Some(raw) = self.limit.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<usize>().map(Some).map_err(|_| {
            EngineError::InvalidInput(format!("limit must be a positive integer, got '{raw}'"))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "interaction_type", alias = "type")]
    pub interaction_type: Option<String>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<RawSearchFilters>,
) -> Result<impl IntoResponse, EngineError> {
    let resp = state.engine.search().search(&filters).await?;
    Ok(Json(resp))
}

pub async fn clear_search_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cleared = state.engine.search().clear_cache();
    tracing::info!(cleared, "Search cache cleared");
    Json(json!({ "success": true, "cleared": cleared }))
}

pub async fn get_search_analytics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.analytics().report())
}

pub async fn post_search_analytics(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SearchAnalyticsEvent>,
) -> impl IntoResponse {
    state.engine.analytics().record(&event);
    Json(json!({ "success": true }))
}

pub async fn get_similar_properties(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<impl IntoResponse, EngineError> {
    let limit = params.limit()?;
    let result = state
        .engine
        .recommendations()
        .similar(&property_id, params.user_id.as_deref(), limit)
        .await?;
    Ok(Json(result))
}

/// Interactions without a user are accepted and dropped.
pub async fn post_similar_interaction(
    State(state): State<Arc<AppState>>,
    Path(property_id): Path<String>,
    Json(req): Json<InteractionRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let has_user = req
        .user_id
        .as_deref()
        .is_some_and(|u| !u.trim().is_empty());
    if has_user {
        let interaction_type: InteractionType = req
            .interaction_type
            .as_deref()
            .ok_or_else(|| EngineError::InvalidInput("interactionType is required".to_string()))?
            .parse()?;
        state.engine.recommendations().record_interaction(
            req.user_id.as_deref(),
            &property_id,
            interaction_type,
        )?;
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::property;
    use crate::catalog::InMemoryCatalog;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::engine::Engine;
    use http_body_util::BodyExt;
    use serde_json::Value;

    fn state() -> (Arc<AppState>, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            property("P1", 100_000.0, 1_000.0, 2, "L1", &["pool"]),
            property("P2", 105_000.0, 1_000.0, 2, "L1", &["pool"]),
            property("P3", 95_000.0, 950.0, 3, "L2", &[]),
        ]));
        let engine = Engine::new(
            Config::default(),
            catalog.clone(),
            Arc::new(ManualClock::new(1_000_000)),
        )
        .unwrap();
        (Arc::new(AppState::new(Arc::new(engine))), catalog)
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn similar_params(user_id: Option<&str>) -> Query<SimilarParams> {
        Query(SimilarParams {
            limit: None,
            user_id: user_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn health_reports_version() {
        let v = body_json(health().await.into_response()).await;
        assert_eq!(v["status"], "ok");
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn search_rejects_invalid_filters_with_400() {
        let (state, _) = state();
        let filters: RawSearchFilters =
            serde_json::from_value(serde_json::json!({"bhk": "two"})).unwrap();
        let resp = search(State(state), Query(filters)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert!(v["error"].as_str().unwrap().contains("bhk"));
    }

    #[tokio::test]
    async fn unknown_property_is_404() {
        let (state, _) = state();
        let resp = get_similar_properties(State(state), Path("P404".to_string()), similar_params(None))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_limit_is_400_with_json_body() {
        let (state, _) = state();
        let params = Query(SimilarParams {
            limit: Some("abc".to_string()),
            user_id: None,
        });
        let resp = get_similar_properties(State(state), Path("P1".to_string()), params)
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert!(v["error"].as_str().unwrap().contains("limit"));
    }

    #[test]
    fn blank_limit_is_absent() {
        let params = SimilarParams {
            limit: Some("  ".to_string()),
            user_id: None,
        };
        assert_eq!(params.limit().unwrap(), None);
        let params = SimilarParams {
            limit: Some(" 3 ".to_string()),
            user_id: None,
        };
        assert_eq!(params.limit().unwrap(), Some(3));
    }

    #[tokio::test]
    async fn catalog_failure_is_500() {
        let (state, catalog) = state();
        catalog.set_failing(true);
        let resp = get_similar_properties(State(state), Path("P1".to_string()), similar_params(None))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn interaction_without_user_succeeds() {
        let (state, _) = state();
        let resp = post_similar_interaction(
            State(state),
            Path("P1".to_string()),
            Json(InteractionRequest {
                user_id: None,
                interaction_type: Some("bogus".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["success"], true);
    }

    #[tokio::test]
    async fn invalid_interaction_type_is_400() {
        let (state, _) = state();
        let resp = post_similar_interaction(
            State(state),
            Path("P1".to_string()),
            Json(InteractionRequest {
                user_id: Some("U1".to_string()),
                interaction_type: Some("share".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analytics_post_without_latency_still_succeeds() {
        let (state, _) = state();
        let event: SearchAnalyticsEvent =
            serde_json::from_value(serde_json::json!({"query": "sea view", "resultCount": 0}))
                .unwrap();
        let resp = post_search_analytics(State(state.clone()), Json(event))
            .await
            .into_response();
        assert_eq!(body_json(resp).await["success"], true);

        let report = body_json(get_search_analytics(State(state)).await.into_response()).await;
        assert_eq!(report["performanceMetrics"]["totalSamples"], 0);
    }
}
