//! Search analytics: cache stats, popularity, trends and latency

pub mod performance;
pub mod popularity;

pub use performance::{PerformanceRecorder, PerformanceSnapshot, QueryLatency};
pub use popularity::{PopularityTracker, SearchAccess};

use crate::cache::CacheStats;
use crate::search::filters::normalize_text;
use crate::search::{fingerprint, FilterLimits, QueryCache, RawSearchFilters};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const TREND_LIMIT: usize = 5;
const SLOWEST_QUERIES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTrends {
    pub trending_up: Vec<String>,
    pub trending_down: Vec<String>,
    pub new_trends: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub cache_stats: CacheStats,
    pub popular_searches: Vec<SearchAccess>,
    pub recent_searches: Vec<SearchAccess>,
    pub search_trends: SearchTrends,
    pub performance_metrics: PerformanceSnapshot,
}

/// Client-reported search timing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalyticsEvent {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub filters: Option<RawSearchFilters>,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    #[serde(default)]
    pub result_count: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct AnalyticsReporter {
    cache: Arc<QueryCache>,
    popularity: PopularityTracker,
    performance: Arc<PerformanceRecorder>,
    limits: FilterLimits,
    top_n: usize,
}

impl AnalyticsReporter {
    pub fn new(
        cache: Arc<QueryCache>,
        performance: Arc<PerformanceRecorder>,
        limits: FilterLimits,
        top_n: usize,
    ) -> Self {
        Self {
            popularity: PopularityTracker::new(cache.clone()),
            cache,
            performance,
            limits,
            top_n,
        }
    }

    pub fn report(&self) -> AnalyticsReport {
        let popular = self.popularity.get_popular_searches(self.top_n);
        let recent = self.popularity.get_recent_searches(self.top_n);
        let search_trends = compute_trends(&popular, &recent);
        let performance_metrics = self.performance.snapshot(SLOWEST_QUERIES);
        let cache_stats = self
            .cache
            .stats()
            .with_average_response_time(performance_metrics.average_response_time_ms);

        AnalyticsReport {
            cache_stats,
            popular_searches: popular,
            recent_searches: recent,
            search_trends,
            performance_metrics,
        }
    }

    /// Record a client-reported latency. Events without `responseTimeMs` are
    /// accepted and ignored. Returns whether a sample was recorded.
    pub fn record(&self, event: &SearchAnalyticsEvent) -> bool {
        let Some(latency_ms) = event.response_time_ms else {
            return false;
        };
        let label = self.label_for(event);
        debug!(
            query = %label,
            latency_ms,
            result_count = ?event.result_count,
            "Recording reported search latency"
        );
        self.performance.record_query_performance(&label, latency_ms);
        true
    }

    /// Reported events are filed under the fingerprint of their filters when
    /// those validate, so they line up with cache-observed latencies.
    fn label_for(&self, event: &SearchAnalyticsEvent) -> String {
        if let Some(filters) = event
            .filters
            .as_ref()
            .and_then(|raw| raw.validate(self.limits).ok())
        {
            return fingerprint(&filters);
        }
        match event.query.as_deref().map(normalize_text) {
            Some(q) if !q.is_empty() => q,
            _ => fingerprint(&Default::default()),
        }
    }
}

/// Set-difference trends between the popular and recent lists.
///
/// `new_trends` are recent but not popular, `trending_down` are popular but
/// not recent, `trending_up` are in both. Each list keeps the order of the
/// list it was scanned from and holds at most five entries.
pub fn compute_trends(popular: &[SearchAccess], recent: &[SearchAccess]) -> SearchTrends {
    let popular_keys: HashSet<&str> = popular.iter().map(|s| s.fingerprint.as_str()).collect();
    let recent_keys: HashSet<&str> = recent.iter().map(|s| s.fingerprint.as_str()).collect();

    let new_trends = recent
        .iter()
        .filter(|s| !popular_keys.contains(s.fingerprint.as_str()))
        .take(TREND_LIMIT)
        .map(|s| s.query.clone())
        .collect();
    let trending_down = popular
        .iter()
        .filter(|s| !recent_keys.contains(s.fingerprint.as_str()))
        .take(TREND_LIMIT)
        .map(|s| s.query.clone())
        .collect();
    let trending_up = recent
        .iter()
        .filter(|s| popular_keys.contains(s.fingerprint.as_str()))
        .take(TREND_LIMIT)
        .map(|s| s.query.clone())
        .collect();

    SearchTrends {
        trending_up,
        trending_down,
        new_trends,
    }
}
