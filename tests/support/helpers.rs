//! Test helper functions for integration tests
//!
//! Procedural helpers, not rstest fixtures: catalog seeding, request
//! construction and response decoding.

use axum::extract::Query;
use axum::http::Uri;
use axum::response::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use property_search_engine::catalog::{PropertyCandidate, SqliteCatalog};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Build an apartment listing with a generated title.
pub fn listing(
    id: &str,
    price: f64,
    area: f64,
    bedrooms: u32,
    location_id: &str,
    categories: &[&str],
) -> PropertyCandidate {
    PropertyCandidate {
        id: id.to_string(),
        title: format!("Apartment {id} in {location_id}"),
        price,
        area,
        bedrooms,
        property_type: "apartment".to_string(),
        location_id: location_id.to_string(),
        category_ids: categories.iter().map(|c| c.to_string()).collect(),
    }
}

/// The listings every integration suite starts from.
pub fn default_listings() -> Vec<PropertyCandidate> {
    let mut villa = listing("P9", 101_000.0, 1_000.0, 2, "L1", &["garden"]);
    villa.property_type = "villa".to_string();
    vec![
        listing("P1", 100_000.0, 1_000.0, 2, "L1", &["pool", "gym"]),
        listing("P2", 104_000.0, 1_050.0, 2, "L1", &["pool", "gym"]),
        listing("P3", 96_000.0, 980.0, 2, "L1", &["pool"]),
        listing("P4", 125_000.0, 1_300.0, 3, "L2", &["gym"]),
        listing("P5", 80_000.0, 700.0, 1, "L3", &[]),
        listing("P6", 450_000.0, 3_200.0, 4, "L4", &["golf", "lake"]),
        listing("P7", 128_000.0, 1_350.0, 3, "L2", &["golf"]),
        villa,
    ]
}

/// Write `listings` into a fresh SQLite catalog at `path`.
pub fn seed_catalog(path: &Path, listings: &[PropertyCandidate]) {
    let catalog = SqliteCatalog::create(path).unwrap();
    for p in listings {
        catalog.upsert_property(p).unwrap();
    }
}

/// Parse a query extractor from a request path such as `/search?bhk=2`.
pub fn query<T: DeserializeOwned>(path_and_query: &str) -> Query<T> {
    let uri: Uri = path_and_query.parse().unwrap();
    Query::try_from_uri(&uri).unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes: Bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Property ids of a `properties` array in a response body.
pub fn ids(v: &Value) -> Vec<String> {
    v["properties"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|p| p["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
