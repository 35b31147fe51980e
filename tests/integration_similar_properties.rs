//! Similar-properties endpoints: ranking, personalization and cache invalidation.

mod support;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use property_search_engine::clock::MS_PER_DAY;
use property_search_engine::handlers::{self, InteractionRequest, SimilarParams};
use rstest::rstest;
use serde_json::Value;
use support::fixtures::*;
use support::helpers::{body_json, ids, query};

async fn similar(app: &TestApp, property_id: &str, params: &str) -> (StatusCode, Value) {
    let path = format!("/properties/{property_id}/similar{params}");
    let resp = handlers::get_similar_properties(
        State(app.state.clone()),
        Path(property_id.to_string()),
        query::<SimilarParams>(&path),
    )
    .await
    .into_response();
    let status = resp.status();
    (status, body_json(resp).await)
}

async fn interact(
    app: &TestApp,
    property_id: &str,
    user_id: Option<&str>,
    interaction_type: Option<&str>,
) -> StatusCode {
    handlers::post_similar_interaction(
        State(app.state.clone()),
        Path(property_id.to_string()),
        Json(InteractionRequest {
            user_id: user_id.map(str::to_string),
            interaction_type: interaction_type.map(str::to_string),
        }),
    )
    .await
    .into_response()
    .status()
}

fn score_ids(v: &Value) -> Vec<String> {
    v["personalizedScores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["propertyId"].as_str().unwrap().to_string())
        .collect()
}

#[rstest]
#[tokio::test]
async fn anonymous_ranking_is_content_based(app: TestApp) {
    let (status, v) = similar(&app, "P1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["algorithm"], "content");
    assert_eq!(v["cacheHit"], false);

    // Same type only, never the target; P6 is outside both location and price band.
    let got = ids(&v);
    assert_eq!(got.len(), 5);
    assert_eq!(&got[..3], ["P2", "P3", "P4"]);
    assert!(!got.iter().any(|id| id == "P1" || id == "P6" || id == "P9"));
    assert_eq!(v["metadata"]["totalCandidates"], 5);
    assert_eq!(score_ids(&v), got);

    for s in v["personalizedScores"].as_array().unwrap() {
        assert_eq!(s["score"], s["baseSimilarity"]);
        assert_eq!(s["personalizationBoost"], 0.0);
    }

    let (_, again) = similar(&app, "P1", "").await;
    assert_eq!(again["cacheHit"], true);
    assert_eq!(again["algorithm"], "content");
    assert_eq!(ids(&again), got);
}

#[rstest]
#[tokio::test]
async fn favorite_on_the_target_invalidates_the_users_ranking(app: TestApp) {
    let (_, first) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(first["cacheHit"], false);
    assert_eq!(similar(&app, "P1", "?userId=U1").await.1["cacheHit"], true);

    assert_eq!(interact(&app, "P1", Some("U1"), Some("favorite")).await, StatusCode::OK);

    let (status, third) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["cacheHit"], false);
    assert_eq!(third["algorithm"], "personalized");
    assert!(!ids(&third).iter().any(|id| id == "P1"));
}

#[rstest]
#[tokio::test]
async fn limit_truncates_after_ranking(app: TestApp) {
    let (_, v) = similar(&app, "P1", "?limit=2").await;
    assert_eq!(ids(&v), vec!["P2", "P3"]);
    assert_eq!(v["metadata"]["totalCandidates"], 5);

    // A different limit is a different cache entry.
    let (_, v) = similar(&app, "P1", "?limit=3").await;
    assert_eq!(v["cacheHit"], false);
}

#[rstest]
#[tokio::test]
async fn empty_limit_falls_back_to_default(app: TestApp) {
    let (status, v) = similar(&app, "P1", "?limit=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&v).len(), 5);

    // Same entry as the request without a limit.
    assert_eq!(similar(&app, "P1", "").await.1["cacheHit"], true);
}

#[rstest]
#[case("P404", "", StatusCode::NOT_FOUND)]
#[case("P.1", "", StatusCode::BAD_REQUEST)]
#[case("P1", "?limit=0", StatusCode::BAD_REQUEST)]
#[case("P1", "?limit=100000", StatusCode::BAD_REQUEST)]
#[case("P1", "?limit=abc", StatusCode::BAD_REQUEST)]
#[case("P1", "?limit=-1", StatusCode::BAD_REQUEST)]
#[tokio::test]
async fn bad_requests_map_to_status(
    app: TestApp,
    #[case] property_id: &str,
    #[case] params: &str,
    #[case] expected: StatusCode,
) {
    let (status, v) = similar(&app, property_id, params).await;
    assert_eq!(status, expected);
    assert!(v["error"].is_string());
}

#[rstest]
#[tokio::test]
async fn contact_pulls_similar_listings_up(app: TestApp) {
    let (_, before) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(before["algorithm"], "personalized");
    assert_eq!(&ids(&before)[..4], ["P2", "P3", "P4", "P7"]);

    assert_eq!(interact(&app, "P7", Some("U1"), Some("contact")).await, StatusCode::OK);

    let (_, after) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(after["cacheHit"], false);
    assert_eq!(after["algorithm"], "personalized");
    assert_eq!(ids(&after), vec!["P2", "P3", "P7", "P4", "P5"]);

    let p7 = after["personalizedScores"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["propertyId"] == "P7")
        .unwrap();
    assert!((p7["personalizationBoost"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert!(p7["score"].as_f64().unwrap() > p7["baseSimilarity"].as_f64().unwrap());
}

#[rstest]
#[tokio::test]
async fn interaction_invalidates_only_that_user(app: TestApp) {
    similar(&app, "P1", "").await;
    similar(&app, "P1", "?userId=U1").await;
    similar(&app, "P1", "?userId=U2").await;
    similar(&app, "P2", "?userId=U1&limit=3").await;
    assert_eq!(app.engine.recommendations().cache_stats().size, 4);

    assert_eq!(interact(&app, "P4", Some("U1"), Some("view")).await, StatusCode::OK);
    assert_eq!(app.engine.recommendations().cache_stats().size, 2);

    assert_eq!(similar(&app, "P1", "").await.1["cacheHit"], true);
    assert_eq!(similar(&app, "P1", "?userId=U2").await.1["cacheHit"], true);
    assert_eq!(similar(&app, "P1", "?userId=U1").await.1["cacheHit"], false);
    assert_eq!(similar(&app, "P2", "?userId=U1&limit=3").await.1["cacheHit"], false);
}

#[rstest]
#[tokio::test]
async fn anonymous_interactions_are_accepted_and_ignored(app: TestApp) {
    similar(&app, "P1", "?userId=U1").await;

    assert_eq!(interact(&app, "P7", None, Some("contact")).await, StatusCode::OK);
    assert_eq!(interact(&app, "P7", Some("  "), Some("bogus")).await, StatusCode::OK);

    let (_, v) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(v["cacheHit"], true);
}

#[rstest]
#[case(None)]
#[case(Some("share"))]
#[tokio::test]
async fn identified_interaction_needs_a_valid_type(app: TestApp, #[case] kind: Option<&str>) {
    assert_eq!(
        interact(&app, "P7", Some("U1"), kind).await,
        StatusCode::BAD_REQUEST
    );
}

#[rstest]
#[tokio::test]
async fn stale_interactions_stop_personalizing(app: TestApp) {
    interact(&app, "P7", Some("U1"), Some("favorite")).await;
    let (_, fresh) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(ids(&fresh)[2], "P7");

    // Past the retention window the history is gone and the cached ranking expired.
    app.clock.advance_ms(91 * MS_PER_DAY);
    let (_, stale) = similar(&app, "P1", "?userId=U1").await;
    assert_eq!(stale["cacheHit"], false);
    assert_eq!(stale["algorithm"], "personalized");
    assert_eq!(&ids(&stale)[..4], ["P2", "P3", "P4", "P7"]);
    for s in stale["personalizedScores"].as_array().unwrap() {
        assert_eq!(s["personalizationBoost"], 0.0);
    }
}

#[rstest]
#[tokio::test]
async fn sweep_drops_expired_recommendations(app: TestApp) {
    similar(&app, "P1", "").await;
    similar(&app, "P2", "").await;

    app.clock.advance_secs(31);
    let (_, swept) = app.engine.sweep_expired();
    assert_eq!(swept, 2);
    assert_eq!(app.engine.recommendations().cache_stats().size, 0);
}

#[rstest]
#[tokio::test]
async fn expired_rankings_leave_stats_before_the_sweep(app: TestApp) {
    similar(&app, "P1", "?userId=U1").await;
    app.clock.advance_secs(31);
    assert_eq!(app.engine.recommendations().cache_stats().size, 0);
}
