use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Registry};

pub mod server;

pub use server::{spawn_metrics_server, MetricsState};

pub struct MetricsRegistry {
    pub registry: Registry,

    // Search metrics
    pub search_duration: Histogram,
    pub search_cache_hits: Counter,
    pub search_cache_misses: Counter,

    // Recommendation metrics
    pub recommendation_duration: Histogram,
    pub recommendation_cache_hits: Counter,
    pub recommendation_cache_misses: Counter,
    pub interactions_recorded: Counter,

    // Collaborator metrics
    pub catalog_errors: Counter,

    // Resource metrics
    pub query_cache_entries: Gauge,
    pub recommendation_cache_entries: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Search duration histogram (0.1ms to 5 seconds)
        let search_duration = Histogram::with_opts(
            HistogramOpts::new("search_duration_seconds", "Search request duration in seconds")
                .buckets(vec![
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
        )?;

        let search_cache_hits = Counter::new(
            "search_cache_hits_total",
            "Total number of search query cache hits",
        )?;

        let search_cache_misses = Counter::new(
            "search_cache_misses_total",
            "Total number of search query cache misses",
        )?;

        let recommendation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "recommendation_duration_seconds",
                "Similar-properties request duration in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;

        let recommendation_cache_hits = Counter::new(
            "recommendation_cache_hits_total",
            "Total number of recommendation cache hits",
        )?;

        let recommendation_cache_misses = Counter::new(
            "recommendation_cache_misses_total",
            "Total number of recommendation cache misses",
        )?;

        let interactions_recorded = Counter::new(
            "interactions_recorded_total",
            "Total number of user interactions recorded",
        )?;

        let catalog_errors = Counter::new(
            "catalog_errors_total",
            "Total number of failed catalog queries",
        )?;

        let query_cache_entries = Gauge::new(
            "query_cache_entries",
            "Current number of entries in the search query cache",
        )?;

        let recommendation_cache_entries = Gauge::new(
            "recommendation_cache_entries",
            "Current number of entries in the recommendation cache",
        )?;

        // Register all metrics
        registry.register(Box::new(search_duration.clone()))?;
        registry.register(Box::new(search_cache_hits.clone()))?;
        registry.register(Box::new(search_cache_misses.clone()))?;
        registry.register(Box::new(recommendation_duration.clone()))?;
        registry.register(Box::new(recommendation_cache_hits.clone()))?;
        registry.register(Box::new(recommendation_cache_misses.clone()))?;
        registry.register(Box::new(interactions_recorded.clone()))?;
        registry.register(Box::new(catalog_errors.clone()))?;
        registry.register(Box::new(query_cache_entries.clone()))?;
        registry.register(Box::new(recommendation_cache_entries.clone()))?;

        Ok(Self {
            registry,
            search_duration,
            search_cache_hits,
            search_cache_misses,
            recommendation_duration,
            recommendation_cache_hits,
            recommendation_cache_misses,
            interactions_recorded,
            catalog_errors,
            query_cache_entries,
            recommendation_cache_entries,
        })
    }
}
