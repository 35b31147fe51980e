//! Similar-properties result cache keyed by (property, user, limit)

use super::SimilarPropertiesResult;
use crate::cache::{CacheStats, TtlLruCache};
use crate::clock::Clock;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecommendationKey {
    pub property_id: String,
    /// `None` for anonymous requests.
    pub user_id: Option<String>,
    pub limit: usize,
}

impl RecommendationKey {
    pub fn new(property_id: &str, user_id: Option<&str>, limit: usize) -> Self {
        Self {
            property_id: property_id.to_string(),
            user_id: user_id.map(str::to_string),
            limit,
        }
    }
}

/// Invalidation stamp observed before a computation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Short-lived cache of ranked results.
///
/// Each invalidation stamps the user with a fresh value from a global epoch.
/// A result may only be stored under the stamp that was current when its
/// computation began, so a ranking computed before an interaction was
/// recorded can never land in the cache after it.
///
/// Stamps of users with no live entries are dropped by
/// [`prune_generations`]. Unstamped users read the `floor`, which is raised
/// to the highest dropped stamp, so a write observed before the prune still
/// fails the check afterwards.
///
/// [`prune_generations`]: RecommendationCache::prune_generations
pub struct RecommendationCache {
    entries: TtlLruCache<RecommendationKey, Arc<SimilarPropertiesResult>>,
    // Lock order: generations, then entries.
    generations: Mutex<Generations>,
}

#[derive(Default)]
struct Generations {
    epoch: u64,
    floor: u64,
    users: HashMap<String, u64>,
}

impl Generations {
    fn current(&self, user_id: &str) -> u64 {
        self.users.get(user_id).copied().unwrap_or(self.floor)
    }
}

impl RecommendationCache {
    pub fn new(max_entries: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlLruCache::new("recommendation", max_entries, ttl, clock),
            generations: Mutex::new(Generations::default()),
        }
    }

    pub fn get(&self, key: &RecommendationKey) -> Option<Arc<SimilarPropertiesResult>> {
        self.entries.get(key)
    }

    pub fn generation(&self, user_id: Option<&str>) -> Generation {
        let Some(user_id) = user_id else {
            return Generation(0);
        };
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        Generation(generations.current(user_id))
    }

    /// Store `value` unless the key's user was invalidated after `observed`
    /// was taken. Returns whether the entry was written.
    pub fn set(
        &self,
        key: RecommendationKey,
        value: Arc<SimilarPropertiesResult>,
        observed: Generation,
    ) -> bool {
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user_id) = key.user_id.as_deref() {
            if generations.current(user_id) != observed.0 {
                debug!(user_id, property_id = %key.property_id, "Skipping stale recommendation write");
                return false;
            }
        }
        self.entries.set(key, value);
        true
    }

    /// Drop every cached result for `user_id`. Returns the number removed.
    pub fn invalidate(&self, user_id: &str) -> usize {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.epoch += 1;
        let stamp = generations.epoch;
        generations.users.insert(user_id.to_string(), stamp);
        let removed = self
            .entries
            .remove_where(|k| k.user_id.as_deref() == Some(user_id));
        if removed > 0 {
            debug!(user_id, removed, "Invalidated recommendations");
        }
        removed
    }

    /// Forget the stamps of users with no live cached entries. Returns the
    /// number of users dropped.
    pub fn prune_generations(&self) -> usize {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        if generations.users.is_empty() {
            return 0;
        }
        let cached: HashSet<String> = self
            .entries
            .access_log()
            .into_iter()
            .filter_map(|r| r.key.user_id)
            .collect();

        let Generations { floor, users, .. } = &mut *generations;
        let before = users.len();
        users.retain(|user_id, stamp| {
            if cached.contains(user_id) {
                return true;
            }
            *floor = (*floor).max(*stamp);
            false
        });
        before - users.len()
    }

    #[cfg(test)]
    pub fn tracked_users(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .users
            .len()
    }

    pub fn evict_expired(&self) -> usize {
        self.entries.evict_expired()
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
}
