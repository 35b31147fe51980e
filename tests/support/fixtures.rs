//! rstest fixtures for integration tests
//!
//! Fixtures build a complete [`TestApp`]: a seeded on-disk SQLite catalog
//! opened read-only, an [`Engine`] driven by a [`ManualClock`], and the
//! [`AppState`] handlers receive.
//!
//! # Usage
//!
//! ```rust
//! use crate::support::fixtures::*;
//!
//! #[rstest]
//! #[tokio::test]
//! async fn my_test(app: TestApp) {
//!     app.clock.advance_secs(10);
//! }
//! ```

use super::helpers::{default_listings, seed_catalog};
use property_search_engine::{
    catalog::SqliteCatalog, clock::ManualClock, config::Config, handlers::AppState, Engine,
};
use rstest::*;
use std::sync::Arc;
use tempfile::TempDir;

/// Arbitrary fixed start time so decay and expiry never depend on the wall clock.
pub const START_MS: u64 = 1_700_000_000_000;

pub struct TestApp {
    pub state: Arc<AppState>,
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

#[fixture]
pub fn config() -> Config {
    Config {
        query_cache_ttl_secs: 60,
        recommendation_cache_ttl_secs: 30,
        ..Config::default()
    }
}

#[fixture]
pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MS))
}

#[fixture]
pub fn app(config: Config, clock: Arc<ManualClock>) -> TestApp {
    build_app(config, clock)
}

/// Same as the [`app`] fixture, for tests that need a tweaked config.
pub fn build_app(config: Config, clock: Arc<ManualClock>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    seed_catalog(&path, &default_listings());

    let config = Config {
        catalog_db_path: path.clone(),
        ..config
    };
    let catalog = SqliteCatalog::open(&path).unwrap();
    let engine = Arc::new(Engine::new(config, Arc::new(catalog), clock.clone()).unwrap());

    TestApp {
        state: Arc::new(AppState::new(engine.clone())),
        engine,
        clock,
        _dir: dir,
    }
}
