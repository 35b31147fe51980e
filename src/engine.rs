//! Service object owning every cache and scorer, with an explicit lifecycle

use crate::analytics::{AnalyticsReporter, PerformanceRecorder};
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::recommend::{
    InteractionLog, RecommendationCache, RecommendationService, SimilarityEngine,
};
use crate::search::{QueryCache, SearchService};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

struct Evictor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Built once at startup and shared with request handlers.
///
/// [`Engine::init`] starts the periodic expiry sweep over both caches;
/// [`Engine::shutdown`] stops it and waits for the task to finish.
pub struct Engine {
    config: Arc<Config>,
    search: SearchService,
    analytics: AnalyticsReporter,
    recommendations: RecommendationService,
    query_cache: Arc<QueryCache>,
    metrics: Arc<MetricsRegistry>,
    evictor: Mutex<Option<Evictor>>,
}

impl Engine {
    pub fn new(config: Config, catalog: Arc<dyn Catalog>, clock: Arc<dyn Clock>) -> Result<Self> {
        let metrics =
            Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
        Ok(Self::with_metrics(config, catalog, clock, metrics))
    }

    pub fn with_metrics(
        config: Config,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let query_cache = Arc::new(QueryCache::new(
            config.query_cache_max_entries,
            config.query_cache_ttl(),
            clock.clone(),
        ));
        let recommendation_cache = Arc::new(RecommendationCache::new(
            config.recommendation_cache_max_entries,
            config.recommendation_cache_ttl(),
            clock.clone(),
        ));
        let performance = Arc::new(PerformanceRecorder::new(config.performance_window));

        let search = SearchService::new(
            catalog.clone(),
            query_cache.clone(),
            performance.clone(),
            metrics.clone(),
            config.filter_limits(),
        );
        let analytics = AnalyticsReporter::new(
            query_cache.clone(),
            performance,
            config.filter_limits(),
            config.analytics_top_n,
        );
        let recommendations = RecommendationService::new(
            catalog,
            recommendation_cache,
            Arc::new(InteractionLog::new(config.retention(), clock.clone())),
            SimilarityEngine::new(config.similarity_weights),
            config.personalization(),
            config.candidate_query(),
            config.similar_limits(),
            clock,
            metrics.clone(),
        );

        Self {
            config: Arc::new(config),
            search,
            analytics,
            recommendations,
            query_cache,
            metrics,
            evictor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn analytics(&self) -> &AnalyticsReporter {
        &self.analytics
    }

    pub fn recommendations(&self) -> &RecommendationService {
        &self.recommendations
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    /// Start the background expiry sweep. Calling it twice is a no-op.
    /// Must run inside a tokio runtime.
    pub fn init(&self) {
        let mut evictor = self.evictor.lock().unwrap_or_else(|e| e.into_inner());
        if evictor.is_some() {
            return;
        }

        let period = self.config.eviction_interval().max(Duration::from_millis(100));
        let (tx, mut rx) = watch::channel(false);
        let query_cache = self.query_cache.clone();
        let recommendations = self.recommendations.clone();
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&query_cache, &recommendations, &metrics);
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Eviction task stopped");
        });

        info!(interval_secs = period.as_secs(), "Started cache eviction task");
        *evictor = Some(Evictor {
            shutdown: tx,
            handle,
        });
    }

    pub fn is_running(&self) -> bool {
        self.evictor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Run one expiry sweep now. Returns (query, recommendation) entries removed.
    /// Users with no retained history or cached rankings are forgotten too.
    pub fn sweep_expired(&self) -> (usize, usize) {
        sweep(&self.query_cache, &self.recommendations, &self.metrics)
    }

    /// Stop the expiry sweep and wait for it to exit.
    pub async fn shutdown(&self) {
        let evictor = self
            .evictor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(evictor) = evictor else {
            return;
        };
        let _ = evictor.shutdown.send(true);
        if let Err(err) = evictor.handle.await {
            warn!(error = %err, "Eviction task ended abnormally");
        }
        info!("Engine shut down");
    }
}

fn sweep(
    query_cache: &QueryCache,
    recommendation_service: &RecommendationService,
    metrics: &MetricsRegistry,
) -> (usize, usize) {
    let queries = query_cache.evict_expired();
    metrics.query_cache_entries.set(query_cache.len() as f64);
    let recommendations = recommendation_service.sweep();
    if queries + recommendations > 0 {
        debug!(queries, recommendations, "Eviction sweep removed expired entries");
    }
    (queries, recommendations)
}
