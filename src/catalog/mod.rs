//! Property catalog collaborator
//!
//! The engine never owns listing data. It asks a [`Catalog`] for candidate
//! records and scores whatever comes back.

use crate::search::SearchFilters;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

pub mod sqlite;

pub use sqlite::SqliteCatalog;

/// Read-only projection of a listing used for search results and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCandidate {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub price: f64,
    pub area: f64,
    pub bedrooms: u32,
    pub property_type: String,
    pub location_id: String,
    #[serde(default)]
    pub category_ids: BTreeSet<String>,
}

/// Neighbourhood used to pre-filter similarity candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateQuery {
    /// Fractional price band around the target, e.g. 0.3 for ±30%.
    pub price_band: f64,
    pub limit: usize,
}

impl CandidateQuery {
    /// True if `candidate` belongs to the target's neighbourhood: same type,
    /// not the target, and either same location or a price within the band.
    pub fn admits(&self, target: &PropertyCandidate, candidate: &PropertyCandidate) -> bool {
        if candidate.id == target.id || candidate.property_type != target.property_type {
            return false;
        }
        if candidate.location_id == target.location_id {
            return true;
        }
        let (low, high) = self.price_range(target.price);
        candidate.price >= low && candidate.price <= high
    }

    pub fn price_range(&self, price: f64) -> (f64, f64) {
        let band = self.price_band.max(0.0);
        (price * (1.0 - band).max(0.0), price * (1.0 + band))
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Listings matching a validated search filter set.
    async fn search(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PropertyCandidate>>;

    async fn get_property(&self, id: &str) -> Result<Option<PropertyCandidate>>;

    /// Batch lookup. Unknown ids are skipped.
    async fn get_properties(&self, ids: &[String]) -> Result<Vec<PropertyCandidate>>;

    /// Candidates in the neighbourhood of `target`, target excluded.
    async fn find_candidates(
        &self,
        target: &PropertyCandidate,
        query: CandidateQuery,
    ) -> Result<Vec<PropertyCandidate>>;
}

/// Catalog held in memory. Used for tests and local demos; can be switched
/// into a failing mode to exercise collaborator errors.
#[derive(Default)]
pub struct InMemoryCatalog {
    properties: RwLock<HashMap<String, PropertyCandidate>>,
    failing: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new(properties: impl IntoIterator<Item = PropertyCandidate>) -> Self {
        let catalog = Self::default();
        for p in properties {
            catalog.insert(p);
        }
        catalog
    }

    pub fn insert(&self, property: PropertyCandidate) {
        self.properties
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(property.id.clone(), property);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("catalog unavailable"));
        }
        Ok(())
    }

    fn sorted(&self) -> Vec<PropertyCandidate> {
        let mut all: Vec<PropertyCandidate> = self
            .properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn search(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PropertyCandidate>> {
        self.check_available()?;
        Ok(self
            .sorted()
            .into_iter()
            .filter(|p| filters.matches(p))
            .take(limit)
            .collect())
    }

    async fn get_property(&self, id: &str) -> Result<Option<PropertyCandidate>> {
        self.check_available()?;
        Ok(self
            .properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn get_properties(&self, ids: &[String]) -> Result<Vec<PropertyCandidate>> {
        self.check_available()?;
        let guard = self.properties.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn find_candidates(
        &self,
        target: &PropertyCandidate,
        query: CandidateQuery,
    ) -> Result<Vec<PropertyCandidate>> {
        self.check_available()?;
        Ok(self
            .sorted()
            .into_iter()
            .filter(|p| query.admits(target, p))
            .take(query.limit)
            .collect())
    }
}
