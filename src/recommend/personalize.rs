//! Blends content similarity with a user's interaction history

use super::interactions::{InteractionType, UserInteraction};
use super::similarity::{sort_ranked, ScoredCandidate, SimilarityEngine};
use crate::catalog::PropertyCandidate;
use crate::clock::MS_PER_DAY;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Content,
    Personalized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionWeights {
    pub contact: f64,
    pub favorite: f64,
    pub view: f64,
    pub search: f64,
}

impl InteractionWeights {
    pub fn weight(&self, interaction_type: InteractionType) -> f64 {
        match interaction_type {
            InteractionType::Contact => self.contact,
            InteractionType::Favorite => self.favorite,
            InteractionType::View => self.view,
            InteractionType::Search => self.search,
        }
    }
}

impl Default for InteractionWeights {
    fn default() -> Self {
        Self {
            contact: 1.0,
            favorite: 0.7,
            view: 0.4,
            search: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonalizationConfig {
    /// Share of the final score taken by the personalization boost.
    pub blend: f64,
    /// Decay constant: an interaction this old weighs `1/e` of a fresh one.
    pub half_life: Duration,
    pub weights: InteractionWeights,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            blend: 0.4,
            half_life: Duration::from_millis(30 * MS_PER_DAY),
            weights: InteractionWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedRecommendation {
    pub property_id: String,
    pub score: f64,
    pub base_similarity: f64,
    pub personalization_boost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizedRanking {
    pub algorithm: Algorithm,
    pub recommendations: Vec<PersonalizedRecommendation>,
}

#[derive(Debug, Clone)]
pub struct PersonalizationScorer {
    similarity: SimilarityEngine,
    config: PersonalizationConfig,
}

/// One interaction resolved to the listing it points at.
struct Affinity<'a> {
    profile: &'a PropertyCandidate,
    weight: f64,
}

impl PersonalizationScorer {
    pub fn new(similarity: SimilarityEngine, config: PersonalizationConfig) -> Self {
        Self { similarity, config }
    }

    /// Re-rank `base` for `user_id`.
    ///
    /// Without a user the base ranking comes back unchanged as `content`.
    /// Otherwise every interaction of that user whose listing is in
    /// `profiles` contributes `type weight * exp(-age / half_life)`, and a
    /// candidate's boost is the weighted mean of its similarity to those
    /// listings. A user with no usable interactions keeps the base scores.
    pub fn personalize(
        &self,
        base: &[ScoredCandidate],
        user_id: Option<&str>,
        interactions: &[UserInteraction],
        profiles: &HashMap<String, PropertyCandidate>,
        now_ms: u64,
    ) -> PersonalizedRanking {
        let Some(user_id) = user_id else {
            return PersonalizedRanking {
                algorithm: Algorithm::Content,
                recommendations: base.iter().map(unboosted).collect(),
            };
        };

        let affinities: Vec<Affinity<'_>> = interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .filter_map(|i| {
                let profile = profiles.get(&i.property_id)?;
                let weight = self.interaction_weight(i, now_ms);
                (weight > 0.0).then_some(Affinity { profile, weight })
            })
            .collect();
        let total_weight: f64 = affinities.iter().map(|a| a.weight).sum();

        if affinities.is_empty() || total_weight <= 0.0 || !total_weight.is_finite() {
            return PersonalizedRanking {
                algorithm: Algorithm::Personalized,
                recommendations: base.iter().map(unboosted).collect(),
            };
        }

        let beta = self.config.blend.clamp(0.0, 1.0);
        let mut recommendations: Vec<PersonalizedRecommendation> = base
            .iter()
            .map(|scored| {
                let affinity: f64 = affinities
                    .iter()
                    .map(|a| a.weight * self.similarity.score(a.profile, &scored.candidate))
                    .sum();
                let boost = (affinity / total_weight).clamp(0.0, 1.0);
                PersonalizedRecommendation {
                    property_id: scored.candidate.id.clone(),
                    score: (scored.score * (1.0 - beta) + boost * beta).clamp(0.0, 1.0),
                    base_similarity: scored.score,
                    personalization_boost: boost,
                }
            })
            .collect();
        sort_ranked(&mut recommendations, |r| (r.score, r.property_id.as_str()));

        PersonalizedRanking {
            algorithm: Algorithm::Personalized,
            recommendations,
        }
    }

    fn interaction_weight(&self, interaction: &UserInteraction, now_ms: u64) -> f64 {
        let age_ms = now_ms.saturating_sub(interaction.timestamp_ms) as f64;
        let half_life_ms = self.config.half_life.as_millis() as f64;
        let decay = if half_life_ms > 0.0 {
            (-age_ms / half_life_ms).exp()
        } else {
            1.0
        };
        self.config.weights.weight(interaction.interaction_type).max(0.0) * decay
    }
}

fn unboosted(scored: &ScoredCandidate) -> PersonalizedRecommendation {
    PersonalizedRecommendation {
        property_id: scored.candidate.id.clone(),
        score: scored.score,
        base_similarity: scored.score,
        personalization_boost: 0.0,
    }
}
