//! Search result cache keyed by filter fingerprint

use crate::cache::{AccessRecord, CacheStats, TtlLruCache};
use crate::catalog::PropertyCandidate;
use crate::clock::Clock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

pub type CachedResults = Arc<Vec<PropertyCandidate>>;

pub struct QueryCache {
    entries: TtlLruCache<String, CachedResults>,
}

impl QueryCache {
    pub fn new(max_entries: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlLruCache::new("query", max_entries, ttl, clock),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<CachedResults> {
        self.entries.get(&fingerprint.to_string())
    }

    /// Store results under `fingerprint`; `ttl` falls back to the configured default.
    pub fn set(&self, fingerprint: &str, results: CachedResults, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| self.entries.default_ttl());
        self.entries.set_with_ttl(fingerprint.to_string(), results, ttl);
    }

    pub fn evict_expired(&self) -> usize {
        self.entries.evict_expired()
    }

    pub fn clear(&self) -> usize {
        self.entries.clear()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    pub fn access_log(&self) -> Vec<AccessRecord<String>> {
        self.entries.access_log()
    }
}
