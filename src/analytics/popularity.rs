//! Popular and recent searches, read from the query cache's access log

use crate::search::fingerprint::describe;
use crate::search::QueryCache;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAccess {
    pub fingerprint: String,
    pub query: String,
    pub access_count: u64,
    pub last_accessed_at: u64,
}

/// Observer over [`QueryCache`]. Only reads the access log; never touches
/// entry recency or counters.
#[derive(Clone)]
pub struct PopularityTracker {
    cache: Arc<QueryCache>,
}

impl PopularityTracker {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self { cache }
    }

    /// Top `n` fingerprints by access count; ties go to the most recently
    /// accessed, then to the fingerprint itself.
    pub fn get_popular_searches(&self, n: usize) -> Vec<SearchAccess> {
        let mut all = self.snapshot();
        all.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        all.truncate(n);
        all
    }

    /// Top `n` fingerprints by last access, regardless of count.
    pub fn get_recent_searches(&self, n: usize) -> Vec<SearchAccess> {
        let mut all = self.snapshot();
        all.sort_by(|a, b| {
            b.last_accessed_at
                .cmp(&a.last_accessed_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        all.truncate(n);
        all
    }

    fn snapshot(&self) -> Vec<SearchAccess> {
        self.cache
            .access_log()
            .into_iter()
            .map(|r| SearchAccess {
                query: describe(&r.key).to_string(),
                fingerprint: r.key,
                access_count: r.access_count,
                last_accessed_at: r.last_accessed_at_ms,
            })
            .collect()
    }
}
