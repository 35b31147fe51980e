//! Rolling per-query latency windows

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

const MAX_TRACKED_QUERIES: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLatency {
    pub query: String,
    pub average_ms: f64,
    pub max_ms: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub average_response_time_ms: f64,
    pub tracked_queries: usize,
    pub total_samples: usize,
    pub slowest_queries: Vec<QueryLatency>,
}

struct Window {
    samples: VecDeque<f64>,
    last_seq: u64,
}

impl Window {
    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }
}

#[derive(Default)]
struct Inner {
    windows: HashMap<String, Window>,
    seq: u64,
}

pub struct PerformanceRecorder {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl PerformanceRecorder {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            capacity: window_capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append a latency sample to `query`'s window, dropping the oldest
    /// sample once the window is full.
    pub fn record_query_performance(&self, query: &str, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            debug!(query, latency_ms, "Ignoring invalid latency sample");
            return;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.seq += 1;
        let seq = inner.seq;

        if !inner.windows.contains_key(query) && inner.windows.len() >= MAX_TRACKED_QUERIES {
            let stalest = inner
                .windows
                .iter()
                .min_by_key(|(_, w)| w.last_seq)
                .map(|(k, _)| k.clone());
            if let Some(k) = stalest {
                inner.windows.remove(&k);
            }
        }

        let capacity = self.capacity;
        let window = inner
            .windows
            .entry(query.to_string())
            .or_insert_with(|| Window {
                samples: VecDeque::with_capacity(capacity),
                last_seq: seq,
            });
        if window.samples.len() == capacity {
            window.samples.pop_front();
        }
        window.samples.push_back(latency_ms);
        window.last_seq = seq;
    }

    /// Mean of `query`'s current window.
    pub fn average_response_time(&self, query: &str) -> Option<f64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.windows.get(query).map(Window::mean)
    }

    pub fn snapshot(&self, slowest: usize) -> PerformanceSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut sum = 0.0;
        let mut total_samples = 0;
        let mut per_query = Vec::with_capacity(inner.windows.len());
        for (query, w) in &inner.windows {
            sum += w.samples.iter().sum::<f64>();
            total_samples += w.samples.len();
            per_query.push(QueryLatency {
                query: query.clone(),
                average_ms: w.mean(),
                max_ms: w.samples.iter().copied().fold(0.0, f64::max),
                samples: w.samples.len(),
            });
        }
        per_query.sort_by(|a, b| {
            b.average_ms
                .total_cmp(&a.average_ms)
                .then_with(|| a.query.cmp(&b.query))
        });
        per_query.truncate(slowest);

        PerformanceSnapshot {
            average_response_time_ms: if total_samples > 0 {
                sum / total_samples as f64
            } else {
                0.0
            },
            tracked_queries: inner.windows.len(),
            total_samples,
            slowest_queries: per_query,
        }
    }
}
