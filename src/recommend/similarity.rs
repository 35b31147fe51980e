//! Content-based similarity between two listings

use crate::catalog::PropertyCandidate;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

const BHK_SPREAD: f64 = 3.0;

/// Component weights. Always positive and normalised to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityWeights {
    pub price: f64,
    pub area: f64,
    pub bhk: f64,
    pub location: f64,
    pub category: f64,
}

impl SimilarityWeights {
    pub fn new(price: f64, area: f64, bhk: f64, location: f64, category: f64) -> Result<Self> {
        let raw = [price, area, bhk, location, category];
        if raw.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(anyhow!("similarity weights must all be positive, got {raw:?}"));
        }
        let sum: f64 = raw.iter().sum();
        Ok(Self {
            price: price / sum,
            area: area / sum,
            bhk: bhk / sum,
            location: location / sum,
            category: category / sum,
        })
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            price: 0.25,
            area: 0.2,
            bhk: 0.2,
            location: 0.2,
            category: 0.15,
        }
    }
}

/// Per-component similarity, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityBreakdown {
    pub price: f64,
    pub area: f64,
    pub bhk: f64,
    pub location: f64,
    pub category: f64,
}

impl SimilarityBreakdown {
    pub fn between(a: &PropertyCandidate, b: &PropertyCandidate) -> Self {
        Self {
            price: closeness(a.price, b.price),
            area: closeness(a.area, b.area),
            bhk: bhk_match(a.bedrooms, b.bedrooms),
            location: if a.location_id == b.location_id { 1.0 } else { 0.0 },
            category: jaccard(&a.category_ids, &b.category_ids),
        }
    }

    pub fn weighted(&self, w: &SimilarityWeights) -> f64 {
        let s = self.price * w.price
            + self.area * w.area
            + self.bhk * w.bhk
            + self.location * w.location
            + self.category * w.category;
        s.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: PropertyCandidate,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    weights: SimilarityWeights,
}

impl SimilarityEngine {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, a: &PropertyCandidate, b: &PropertyCandidate) -> f64 {
        SimilarityBreakdown::between(a, b).weighted(&self.weights)
    }

    /// Score `candidates` against `target` and return the best `limit`,
    /// highest first. The target itself and repeated ids are skipped; equal
    /// scores are ordered by id.
    pub fn find_similar(
        &self,
        target: &PropertyCandidate,
        candidates: &[PropertyCandidate],
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut seen = HashSet::new();
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .filter(|c| c.id != target.id && seen.insert(c.id.as_str()))
            .map(|c| ScoredCandidate {
                score: self.score(target, c),
                candidate: c.clone(),
            })
            .collect();
        sort_ranked(&mut scored, |s| (s.score, s.candidate.id.as_str()));
        scored.truncate(limit);
        scored
    }
}

/// Sort descending by score, ascending by id on ties.
pub(crate) fn sort_ranked<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (f64, &str),
{
    items.sort_by(|a, b| {
        let (sa, ia) = key(a);
        let (sb, ib) = key(b);
        sb.total_cmp(&sa).then_with(|| ia.cmp(ib))
    });
}

/// `1 - |a - b| / max(a, b)`, clamped to [0, 1].
fn closeness(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return 0.0;
    }
    let max = a.max(b);
    if max <= 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    (1.0 - (a - b).abs() / max).clamp(0.0, 1.0)
}

fn bhk_match(a: u32, b: u32) -> f64 {
    let diff = (a as f64 - b as f64).abs().min(BHK_SPREAD);
    1.0 - diff / BHK_SPREAD
}

/// Jaccard index; two empty sets count as identical.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}
