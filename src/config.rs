use crate::catalog::CandidateQuery;
use crate::clock::MS_PER_DAY;
use crate::recommend::{
    InteractionWeights, PersonalizationConfig, RetentionPolicy, SimilarLimits, SimilarityWeights,
};
use crate::search::FilterLimits;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::{env, net::SocketAddr, num::NonZeroUsize, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub catalog_db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub cors_enabled: bool,

    // Query cache
    pub query_cache_max_entries: NonZeroUsize,
    pub query_cache_ttl_secs: u64,

    // Recommendation cache
    pub recommendation_cache_max_entries: NonZeroUsize,
    pub recommendation_cache_ttl_secs: u64,

    pub eviction_interval_secs: u64,

    // Analytics
    pub performance_window: usize,
    pub analytics_top_n: usize,

    // Limits
    pub search_default_limit: usize,
    pub search_max_limit: usize,
    pub similar_default_limit: usize,
    pub similar_max_limit: usize,

    // Candidate selection
    pub candidate_pool_size: usize,
    pub candidate_price_band: f64,

    // Scoring
    pub similarity_weights: SimilarityWeights,
    pub personalization_blend: f64,
    pub decay_half_life_days: f64,
    pub interaction_weight_contact: f64,
    pub interaction_weight_favorite: f64,
    pub interaction_weight_view: f64,
    pub interaction_weight_search: f64,

    // Interaction retention
    pub interaction_max_per_user: usize,
    pub interaction_max_age_days: u64,

    // Metrics
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_db_path: PathBuf::from("catalog.db"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_enabled: true,
            query_cache_max_entries: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            query_cache_ttl_secs: 300,
            recommendation_cache_max_entries: NonZeroUsize::new(1000)
                .unwrap_or(NonZeroUsize::MIN),
            recommendation_cache_ttl_secs: 120,
            eviction_interval_secs: 60,
            performance_window: 100,
            analytics_top_n: 10,
            search_default_limit: 20,
            search_max_limit: 100,
            similar_default_limit: 6,
            similar_max_limit: 50,
            candidate_pool_size: 100,
            candidate_price_band: 0.3,
            similarity_weights: SimilarityWeights::default(),
            personalization_blend: 0.4,
            decay_half_life_days: 30.0,
            interaction_weight_contact: 1.0,
            interaction_weight_favorite: 0.7,
            interaction_weight_view: 0.4,
            interaction_weight_search: 0.2,
            interaction_max_per_user: 100,
            interaction_max_age_days: 90,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let catalog_db_path = PathBuf::from(required_env("CATALOG_DB_PATH")?);

        let bind_addr = optional_env("BIND_ADDR")
            .as_deref()
            .map(|v| {
                v.parse::<SocketAddr>()
                    .map_err(|err| anyhow!("Invalid BIND_ADDR '{v}': {err}"))
            })
            .transpose()?
            .unwrap_or(defaults.bind_addr);

        let cors_enabled = optional_env("CORS_ENABLED")
            .as_deref()
            .map(parse_bool)
            .transpose()?
            .unwrap_or(defaults.cors_enabled);

        let query_cache_max_entries = optional_env("QUERY_CACHE_MAX_ENTRIES")
            .as_deref()
            .map(|v| parse_nonzero("QUERY_CACHE_MAX_ENTRIES", v))
            .transpose()?
            .unwrap_or(defaults.query_cache_max_entries);

        let query_cache_ttl_secs = optional_env("QUERY_CACHE_TTL_SECS")
            .as_deref()
            .map(|v| parse_positive_u64("QUERY_CACHE_TTL_SECS", v))
            .transpose()?
            .unwrap_or(defaults.query_cache_ttl_secs);

        let recommendation_cache_max_entries = optional_env("RECOMMENDATION_CACHE_MAX_ENTRIES")
            .as_deref()
            .map(|v| parse_nonzero("RECOMMENDATION_CACHE_MAX_ENTRIES", v))
            .transpose()?
            .unwrap_or(defaults.recommendation_cache_max_entries);

        let recommendation_cache_ttl_secs = optional_env("RECOMMENDATION_CACHE_TTL_SECS")
            .as_deref()
            .map(|v| parse_positive_u64("RECOMMENDATION_CACHE_TTL_SECS", v))
            .transpose()?
            .unwrap_or(defaults.recommendation_cache_ttl_secs);

        let eviction_interval_secs = optional_env("EVICTION_INTERVAL_SECS")
            .as_deref()
            .map(|v| parse_positive_u64("EVICTION_INTERVAL_SECS", v))
            .transpose()?
            .unwrap_or(defaults.eviction_interval_secs);

        let performance_window = optional_env("PERFORMANCE_WINDOW")
            .as_deref()
            .map(|v| parse_nonzero("PERFORMANCE_WINDOW", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.performance_window);

        let analytics_top_n = optional_env("ANALYTICS_TOP_N")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(defaults.analytics_top_n);

        let search_default_limit = optional_env("SEARCH_DEFAULT_LIMIT")
            .as_deref()
            .map(|v| parse_nonzero("SEARCH_DEFAULT_LIMIT", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.search_default_limit);
        let search_max_limit = optional_env("SEARCH_MAX_LIMIT")
            .as_deref()
            .map(|v| parse_nonzero("SEARCH_MAX_LIMIT", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.search_max_limit);
        if search_default_limit > search_max_limit {
            return Err(anyhow!(
                "SEARCH_DEFAULT_LIMIT ({search_default_limit}) exceeds SEARCH_MAX_LIMIT ({search_max_limit})"
            ));
        }

        let similar_default_limit = optional_env("SIMILAR_DEFAULT_LIMIT")
            .as_deref()
            .map(|v| parse_nonzero("SIMILAR_DEFAULT_LIMIT", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.similar_default_limit);
        let similar_max_limit = optional_env("SIMILAR_MAX_LIMIT")
            .as_deref()
            .map(|v| parse_nonzero("SIMILAR_MAX_LIMIT", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.similar_max_limit);
        if similar_default_limit > similar_max_limit {
            return Err(anyhow!(
                "SIMILAR_DEFAULT_LIMIT ({similar_default_limit}) exceeds SIMILAR_MAX_LIMIT ({similar_max_limit})"
            ));
        }

        let candidate_pool_size = optional_env("CANDIDATE_POOL_SIZE")
            .as_deref()
            .map(|v| parse_nonzero("CANDIDATE_POOL_SIZE", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.candidate_pool_size);

        let candidate_price_band = optional_env("CANDIDATE_PRICE_BAND")
            .as_deref()
            .map(|v| parse_unit_f64("CANDIDATE_PRICE_BAND", v))
            .transpose()?
            .unwrap_or(defaults.candidate_price_band);

        let d = defaults.similarity_weights;
        let weight = |key: &str, default: f64| -> Result<f64> {
            Ok(optional_env(key)
                .as_deref()
                .map(parse_f64)
                .transpose()
                .with_context(|| format!("Invalid {key}"))?
                .unwrap_or(default))
        };
        let similarity_weights = SimilarityWeights::new(
            weight("SIMILARITY_WEIGHT_PRICE", d.price)?,
            weight("SIMILARITY_WEIGHT_AREA", d.area)?,
            weight("SIMILARITY_WEIGHT_BHK", d.bhk)?,
            weight("SIMILARITY_WEIGHT_LOCATION", d.location)?,
            weight("SIMILARITY_WEIGHT_CATEGORY", d.category)?,
        )
        .context("Invalid SIMILARITY_WEIGHT_*")?;

        let personalization_blend = optional_env("PERSONALIZATION_BLEND")
            .as_deref()
            .map(|v| parse_unit_f64("PERSONALIZATION_BLEND", v))
            .transpose()?
            .unwrap_or(defaults.personalization_blend);

        let decay_half_life_days = optional_env("DECAY_HALF_LIFE_DAYS")
            .as_deref()
            .map(|v| parse_positive_f64("DECAY_HALF_LIFE_DAYS", v))
            .transpose()?
            .unwrap_or(defaults.decay_half_life_days);

        let interaction_weight = |key: &str, default: f64| -> Result<f64> {
            Ok(optional_env(key)
                .as_deref()
                .map(|v| parse_positive_f64(key, v))
                .transpose()?
                .unwrap_or(default))
        };
        let interaction_weight_contact =
            interaction_weight("INTERACTION_WEIGHT_CONTACT", defaults.interaction_weight_contact)?;
        let interaction_weight_favorite =
            interaction_weight("INTERACTION_WEIGHT_FAVORITE", defaults.interaction_weight_favorite)?;
        let interaction_weight_view =
            interaction_weight("INTERACTION_WEIGHT_VIEW", defaults.interaction_weight_view)?;
        let interaction_weight_search =
            interaction_weight("INTERACTION_WEIGHT_SEARCH", defaults.interaction_weight_search)?;

        let interaction_max_per_user = optional_env("INTERACTION_MAX_PER_USER")
            .as_deref()
            .map(|v| parse_nonzero("INTERACTION_MAX_PER_USER", v).map(NonZeroUsize::get))
            .transpose()?
            .unwrap_or(defaults.interaction_max_per_user);

        let interaction_max_age_days = optional_env("INTERACTION_MAX_AGE_DAYS")
            .as_deref()
            .map(|v| parse_positive_u64("INTERACTION_MAX_AGE_DAYS", v))
            .transpose()?
            .unwrap_or(defaults.interaction_max_age_days);

        let metrics_enabled = optional_env("METRICS_ENABLED")
            .as_deref()
            .map(parse_bool)
            .transpose()?
            .unwrap_or(defaults.metrics_enabled);

        let metrics_port = optional_env("METRICS_PORT")
            .as_deref()
            .map(|v| {
                v.trim()
                    .parse::<u16>()
                    .map_err(|err| anyhow!("Invalid METRICS_PORT '{v}': {err}"))
            })
            .transpose()?
            .unwrap_or(defaults.metrics_port);

        Ok(Self {
            catalog_db_path,
            bind_addr,
            cors_enabled,
            query_cache_max_entries,
            query_cache_ttl_secs,
            recommendation_cache_max_entries,
            recommendation_cache_ttl_secs,
            eviction_interval_secs,
            performance_window,
            analytics_top_n,
            search_default_limit,
            search_max_limit,
            similar_default_limit,
            similar_max_limit,
            candidate_pool_size,
            candidate_price_band,
            similarity_weights,
            personalization_blend,
            decay_half_life_days,
            interaction_weight_contact,
            interaction_weight_favorite,
            interaction_weight_view,
            interaction_weight_search,
            interaction_max_per_user,
            interaction_max_age_days,
            metrics_enabled,
            metrics_port,
        })
    }

    pub fn query_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.query_cache_ttl_secs)
    }

    pub fn recommendation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.recommendation_cache_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn filter_limits(&self) -> FilterLimits {
        FilterLimits {
            default_limit: self.search_default_limit,
            max_limit: self.search_max_limit,
        }
    }

    pub fn similar_limits(&self) -> SimilarLimits {
        SimilarLimits {
            default_limit: self.similar_default_limit,
            max_limit: self.similar_max_limit,
        }
    }

    pub fn candidate_query(&self) -> CandidateQuery {
        CandidateQuery {
            price_band: self.candidate_price_band,
            limit: self.candidate_pool_size,
        }
    }

    pub fn personalization(&self) -> PersonalizationConfig {
        PersonalizationConfig {
            blend: self.personalization_blend,
            half_life: Duration::from_millis((self.decay_half_life_days * MS_PER_DAY as f64) as u64),
            weights: InteractionWeights {
                contact: self.interaction_weight_contact,
                favorite: self.interaction_weight_favorite,
                view: self.interaction_weight_view,
                search: self.interaction_weight_search,
            },
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_per_user: self.interaction_max_per_user,
            max_age: Duration::from_millis(self.interaction_max_age_days * MS_PER_DAY),
        }
    }
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| anyhow!("Missing required env var: {key}"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn parse_usize(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_u64(value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_nonzero(key: &str, value: &str) -> Result<NonZeroUsize> {
    NonZeroUsize::new(parse_usize(value)?).ok_or_else(|| anyhow!("{key} must be greater than 0"))
}

fn parse_positive_u64(key: &str, value: &str) -> Result<u64> {
    match parse_u64(value)? {
        0 => Err(anyhow!("{key} must be greater than 0")),
        v => Ok(v),
    }
}

fn parse_f64(value: &str) -> Result<f64> {
    let v = value
        .trim()
        .parse::<f64>()
        .map_err(|err| anyhow!("Invalid float '{value}': {err}"))?;
    if !v.is_finite() {
        return Err(anyhow!("Invalid float '{value}': not finite"));
    }
    Ok(v)
}

fn parse_positive_f64(key: &str, value: &str) -> Result<f64> {
    let v = parse_f64(value)?;
    if v <= 0.0 {
        return Err(anyhow!("{key} must be greater than 0"));
    }
    Ok(v)
}

fn parse_unit_f64(key: &str, value: &str) -> Result<f64> {
    let v = parse_f64(value)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(anyhow!("{key} must be in 0..=1"));
    }
    Ok(v)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{other}'")),
    }
}
