//! Bounded key/value store with per-entry TTL and LRU eviction.
//!
//! Both the search query cache and the recommendation cache are built on
//! [`TtlLruCache`]. Every operation takes the cache's own mutex, so `get`,
//! `set` and the expiry sweep never interleave. A poisoned lock is treated as
//! a cache fault: the entries are dropped and the cache keeps serving misses
//! until it is repopulated.

use crate::clock::Clock;
use lru::LruCache;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
    pub created_at_ms: u64,
    pub last_accessed_at_ms: u64,
    pub access_count: u64,
    pub expires_at_ms: u64,
}

impl<K, V> CacheEntry<K, V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Read-only view of an entry's access bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord<K> {
    pub key: K,
    pub access_count: u64,
    pub created_at_ms: u64,
    pub last_accessed_at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub total_queries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub average_response_time_ms: f64,
}

impl CacheStats {
    pub fn with_average_response_time(mut self, average_ms: f64) -> Self {
        self.average_response_time_ms = average_ms;
        self
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<K, V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

pub struct TtlLruCache<K: Hash + Eq, V> {
    name: &'static str,
    inner: Mutex<Inner<K, V>>,
    capacity: NonZeroUsize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(
        name: &'static str,
        capacity: NonZeroUsize,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            capacity,
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(cache = self.name, "Cache lock poisoned, dropping all entries");
                let mut guard = poisoned.into_inner();
                guard.entries.clear();
                self.inner.clear_poison();
                guard
            }
        }
    }

    /// Look up `key`. Hits refresh recency and bump the access count; an
    /// expired entry is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = inner.entries.peek(key).map(|e| e.is_expired(now));
        match expired {
            None => {
                inner.misses += 1;
                None
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            }
            Some(false) => {
                let value = inner.entries.get_mut(key).map(|entry| {
                    entry.access_count += 1;
                    entry.last_accessed_at_ms = now;
                    entry.value.clone()
                });
                if value.is_some() {
                    inner.hits += 1;
                } else {
                    inner.misses += 1;
                }
                value
            }
        }
    }

    /// Check for a live entry without touching recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now_ms();
        self.lock()
            .entries
            .peek(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert a fully formed entry. When the cache is full the least recently
    /// used entry is evicted first.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let now = self.clock.now_ms();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at_ms: now,
            last_accessed_at_ms: now,
            access_count: 1,
            expires_at_ms: now.saturating_add(ttl.as_millis() as u64),
        };

        let mut guard = self.lock();
        let inner = &mut *guard;
        let replacing = inner.entries.contains(&key);
        if let Some(_evicted) = inner.entries.push(key, entry) {
            if !replacing {
                inner.evictions += 1;
                debug!(cache = self.name, evictions = inner.evictions, "Evicted LRU entry");
            }
        }
    }

    /// Remove every entry whose key matches `pred`. Returns the number removed.
    pub fn remove_where<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut guard = self.lock();
        let doomed: Vec<K> = guard
            .entries
            .iter()
            .filter(|(k, _)| pred(*k))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            guard.entries.pop(k);
        }
        doomed.len()
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let expired: Vec<K> = guard
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            guard.entries.pop(k);
        }
        guard.expirations += expired.len() as u64;
        if !expired.is_empty() {
            debug!(cache = self.name, removed = expired.len(), "Expired entries swept");
        }
        expired.len()
    }

    /// Remove all entries and reset the counters. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.lock();
        let removed = guard.entries.len();
        guard.entries.clear();
        guard.hits = 0;
        guard.misses = 0;
        guard.evictions = 0;
        guard.expirations = 0;
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters plus the number of live entries. Expired entries still
    /// waiting for a sweep are not counted.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let guard = self.lock();
        let total = guard.hits + guard.misses;
        CacheStats {
            size: guard.entries.iter().filter(|(_, e)| !e.is_expired(now)).count(),
            capacity: self.capacity.get(),
            total_queries: total,
            hits: guard.hits,
            misses: guard.misses,
            hit_rate: if total > 0 {
                guard.hits as f64 / total as f64
            } else {
                0.0
            },
            evictions: guard.evictions,
            expirations: guard.expirations,
            average_response_time_ms: 0.0,
        }
    }

    /// Access bookkeeping for live entries, in no particular order. Does not
    /// touch recency.
    pub fn access_log(&self) -> Vec<AccessRecord<K>> {
        let now = self.clock.now_ms();
        self.lock()
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(_, e)| AccessRecord {
                key: e.key.clone(),
                access_count: e.access_count,
                created_at_ms: e.created_at_ms,
                last_accessed_at_ms: e.last_accessed_at_ms,
            })
            .collect()
    }
}
