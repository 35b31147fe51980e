//! Property search: fingerprint, query cache, catalog fallback

pub mod cache;
pub mod filters;
pub mod fingerprint;

pub use cache::{CachedResults, QueryCache};
pub use filters::{FilterLimits, FilterValue, RawSearchFilters, SearchFilters};
pub use fingerprint::fingerprint;

use crate::analytics::PerformanceRecorder;
use crate::catalog::{Catalog, PropertyCandidate};
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub fingerprint: String,
    pub cache_hit: bool,
    pub total: usize,
    pub properties: Vec<PropertyCandidate>,
    pub processing_time_ms: f64,
}

#[derive(Clone)]
pub struct SearchService {
    catalog: Arc<dyn Catalog>,
    cache: Arc<QueryCache>,
    performance: Arc<PerformanceRecorder>,
    metrics: Arc<MetricsRegistry>,
    limits: FilterLimits,
}

impl SearchService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        cache: Arc<QueryCache>,
        performance: Arc<PerformanceRecorder>,
        metrics: Arc<MetricsRegistry>,
        limits: FilterLimits,
    ) -> Self {
        Self {
            catalog,
            cache,
            performance,
            metrics,
            limits,
        }
    }

    pub fn limits(&self) -> FilterLimits {
        self.limits
    }

    /// Validate raw filters at the boundary, then search.
    pub async fn search(&self, raw: &RawSearchFilters) -> EngineResult<SearchResponse> {
        let filters = raw.validate(self.limits)?;
        self.search_filters(&filters).await
    }

    pub async fn search_filters(&self, filters: &SearchFilters) -> EngineResult<SearchResponse> {
        let started = Instant::now();
        let key = fingerprint(filters);

        if let Some(results) = self.cache.get(&key) {
            self.metrics.search_cache_hits.inc();
            let elapsed = started.elapsed();
            self.metrics.search_duration.observe(elapsed.as_secs_f64());
            debug!(fingerprint = %key, results = results.len(), "Search cache hit");
            return Ok(SearchResponse {
                fingerprint: key,
                cache_hit: true,
                total: results.len(),
                properties: results.as_ref().clone(),
                processing_time_ms: elapsed.as_secs_f64() * 1000.0,
            });
        }

        self.metrics.search_cache_misses.inc();
        let limit = filters.effective_limit(self.limits.default_limit);
        let results = match self.catalog.search(filters, limit).await {
            Ok(results) => results,
            Err(err) => {
                self.metrics.catalog_errors.inc();
                warn!(fingerprint = %key, error = %err, "Catalog search failed");
                return Err(EngineError::catalog(err));
            }
        };

        let results = Arc::new(results);
        self.cache.set(&key, results.clone(), None);
        self.metrics.query_cache_entries.set(self.cache.len() as f64);

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.performance.record_query_performance(&key, elapsed_ms);
        self.metrics.search_duration.observe(elapsed.as_secs_f64());
        debug!(fingerprint = %key, results = results.len(), elapsed_ms, "Search cache miss");

        Ok(SearchResponse {
            fingerprint: key,
            cache_hit: false,
            total: results.len(),
            properties: results.as_ref().clone(),
            processing_time_ms: elapsed_ms,
        })
    }

    pub fn clear_cache(&self) -> usize {
        let cleared = self.cache.clear();
        self.metrics.query_cache_entries.set(0.0);
        cleared
    }
}
