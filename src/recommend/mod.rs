//! "Similar properties": content similarity, personalization and caching

pub mod cache;
pub mod interactions;
pub mod personalize;
pub mod similarity;

pub use cache::{Generation, RecommendationCache, RecommendationKey};
pub use interactions::{InteractionLog, InteractionType, RetentionPolicy, UserInteraction};
pub use personalize::{
    Algorithm, InteractionWeights, PersonalizationConfig, PersonalizationScorer,
    PersonalizedRecommendation,
};
pub use similarity::{ScoredCandidate, SimilarityEngine, SimilarityWeights};

use crate::cache::CacheStats;
use crate::catalog::{CandidateQuery, Catalog, PropertyCandidate};
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsRegistry;
use anyhow::Context;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const MAX_ID_LEN: usize = 64;
const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationMetadata {
    pub processing_time_ms: f64,
    pub total_candidates: usize,
    pub cache_stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPropertiesResult {
    pub properties: Vec<PropertyCandidate>,
    pub personalized_scores: Vec<PersonalizedRecommendation>,
    pub cache_hit: bool,
    pub algorithm: Algorithm,
    pub metadata: RecommendationMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Clone)]
pub struct RecommendationService {
    catalog: Arc<dyn Catalog>,
    cache: Arc<RecommendationCache>,
    interactions: Arc<InteractionLog>,
    similarity: SimilarityEngine,
    scorer: PersonalizationScorer,
    candidates: CandidateQuery,
    limits: SimilarLimits,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
}

impl RecommendationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        cache: Arc<RecommendationCache>,
        interactions: Arc<InteractionLog>,
        similarity: SimilarityEngine,
        personalization: PersonalizationConfig,
        candidates: CandidateQuery,
        limits: SimilarLimits,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            scorer: PersonalizationScorer::new(similarity.clone(), personalization),
            catalog,
            cache,
            interactions,
            similarity,
            candidates,
            limits,
            clock,
            metrics,
        }
    }

    /// Ranked listings similar to `property_id`, personalized when a user is
    /// given. Results are cached per (property, user, limit); a failed
    /// computation caches nothing.
    pub async fn similar(
        &self,
        property_id: &str,
        user_id: Option<&str>,
        limit: Option<usize>,
    ) -> EngineResult<SimilarPropertiesResult> {
        let started = Instant::now();
        let property_id = validate_property_id(property_id)?;
        let user_id = validate_user_id(user_id)?;
        let limit = self.validate_limit(limit)?;

        let key = RecommendationKey::new(property_id, user_id, limit);
        let observed = self.cache.generation(user_id);

        if let Some(cached) = self.cache.get(&key) {
            self.metrics.recommendation_cache_hits.inc();
            let elapsed = started.elapsed();
            self.metrics.recommendation_duration.observe(elapsed.as_secs_f64());
            debug!(property_id, user_id, limit, "Recommendation cache hit");
            let mut result = cached.as_ref().clone();
            result.cache_hit = true;
            result.metadata.processing_time_ms = elapsed.as_secs_f64() * 1000.0;
            result.metadata.cache_stats = self.cache.stats();
            return Ok(result);
        }
        self.metrics.recommendation_cache_misses.inc();

        let mut result = self
            .compute(property_id, user_id, limit)
            .await
            .inspect_err(|err| {
                if matches!(err, EngineError::Catalog(_)) {
                    self.metrics.catalog_errors.inc();
                    warn!(property_id, error = %err, "Similar properties computation failed");
                }
            })?;

        let elapsed = started.elapsed();
        result.metadata.processing_time_ms = elapsed.as_secs_f64() * 1000.0;
        self.cache.set(key, Arc::new(result.clone()), observed);
        self.metrics
            .recommendation_cache_entries
            .set(self.cache.len() as f64);
        self.metrics.recommendation_duration.observe(elapsed.as_secs_f64());
        result.metadata.cache_stats = self.cache.stats();

        debug!(
            property_id,
            user_id,
            algorithm = ?result.algorithm,
            candidates = result.metadata.total_candidates,
            returned = result.properties.len(),
            "Recommendation computed"
        );
        Ok(result)
    }

    async fn compute(
        &self,
        property_id: &str,
        user_id: Option<&str>,
        limit: usize,
    ) -> EngineResult<SimilarPropertiesResult> {
        let target = self
            .catalog
            .get_property(property_id)
            .await
            .with_context(|| format!("failed to load property {property_id}"))
            .map_err(EngineError::catalog)?
            .ok_or_else(|| EngineError::NotFound(format!("property '{property_id}'")))?;

        let history = user_id
            .map(|u| self.interactions.for_user(u))
            .unwrap_or_default();
        let profile_ids: Vec<String> = history
            .iter()
            .map(|i| i.property_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (candidates, profiles) = futures::try_join!(
            async {
                self.catalog
                    .find_candidates(&target, self.candidates)
                    .await
                    .with_context(|| format!("failed to load candidates for {property_id}"))
            },
            async {
                if profile_ids.is_empty() {
                    return Ok(Vec::new());
                }
                self.catalog
                    .get_properties(&profile_ids)
                    .await
                    .context("failed to load interaction profiles")
            },
        )
        .map_err(EngineError::catalog)?;

        let total_candidates = candidates.len();
        let base = self
            .similarity
            .find_similar(&target, &candidates, total_candidates);
        let profiles: HashMap<String, PropertyCandidate> =
            profiles.into_iter().map(|p| (p.id.clone(), p)).collect();

        let mut ranking = self.scorer.personalize(
            &base,
            user_id,
            &history,
            &profiles,
            self.clock.now_ms(),
        );
        ranking.recommendations.truncate(limit);

        let by_id: HashMap<&str, &PropertyCandidate> = base
            .iter()
            .map(|s| (s.candidate.id.as_str(), &s.candidate))
            .collect();
        let properties = ranking
            .recommendations
            .iter()
            .filter_map(|r| by_id.get(r.property_id.as_str()).map(|p| (*p).clone()))
            .collect();

        Ok(SimilarPropertiesResult {
            properties,
            personalized_scores: ranking.recommendations,
            cache_hit: false,
            algorithm: ranking.algorithm,
            metadata: RecommendationMetadata {
                processing_time_ms: 0.0,
                total_candidates,
                cache_stats: CacheStats::default(),
            },
        })
    }

    /// Append an interaction and drop the user's cached rankings. Without a
    /// user this is a no-op; returns whether anything was recorded.
    pub fn record_interaction(
        &self,
        user_id: Option<&str>,
        property_id: &str,
        interaction_type: InteractionType,
    ) -> EngineResult<bool> {
        let property_id = validate_property_id(property_id)?;
        let Some(user_id) = validate_user_id(user_id)? else {
            debug!(property_id, "Ignoring interaction without user");
            return Ok(false);
        };

        self.interactions
            .record(user_id, property_id, interaction_type);
        let invalidated = self.cache.invalidate(user_id);
        self.metrics.interactions_recorded.inc();
        self.metrics
            .recommendation_cache_entries
            .set(self.cache.len() as f64);
        info!(
            user_id,
            property_id,
            interaction = %interaction_type,
            invalidated,
            "Recorded interaction"
        );
        Ok(true)
    }

    /// Drop expired rankings, then forget users with nothing left to track.
    /// Returns the number of cached rankings removed.
    pub fn sweep(&self) -> usize {
        let expired = self.cache.evict_expired();
        let idle_generations = self.cache.prune_generations();
        let idle_users = self.interactions.prune();
        self.metrics
            .recommendation_cache_entries
            .set(self.cache.len() as f64);
        if idle_generations + idle_users > 0 {
            debug!(idle_generations, idle_users, "Pruned idle users");
        }
        expired
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn validate_limit(&self, limit: Option<usize>) -> EngineResult<usize> {
        match limit {
            None => Ok(self.limits.default_limit),
            Some(n) if n == 0 || n > self.limits.max_limit => Err(EngineError::InvalidInput(
                format!("limit must be between 1 and {}", self.limits.max_limit),
            )),
            Some(n) => Ok(n),
        }
    }
}

fn validate_property_id(id: &str) -> EngineResult<&str> {
    let id = id.trim();
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(EngineError::InvalidInput(format!(
            "property id must be 1 to {MAX_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(EngineError::InvalidInput(format!(
            "property id '{id}' contains invalid characters"
        )));
    }
    Ok(id)
}

/// Blank user ids count as anonymous.
fn validate_user_id(user_id: Option<&str>) -> EngineResult<Option<&str>> {
    match user_id.map(str::trim) {
        None | Some("") => Ok(None),
        Some(u) if u.len() > MAX_USER_ID_LEN || u.chars().any(char::is_control) => {
            Err(EngineError::InvalidInput(format!(
                "user id must be at most {MAX_USER_ID_LEN} printable characters"
            )))
        }
        Some(u) => Ok(Some(u)),
    }
}
