use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::key::CacheKey;

/// Tracks how requests were served by a reuse cache
#[derive(Debug, Default)]
pub struct ReuseMetrics {
    fetch_times: RwLock<HashMap<CacheKey, Duration>>,
    hits: AtomicU64,
    coalesced: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl ReuseMetrics {
    /// Create a new instance of ReuseMetrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request served from a resolved entry
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that joined a fetch already in flight
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that started a new fetch
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed fetch
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long the fetch for a key took
    pub fn record_fetch_time(&self, key: CacheKey, duration: Duration) {
        self.fetch_times.write().insert(key, duration);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Number of fetches started
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Share of requests that did not start a fetch, as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let reused = (self.hits() + self.coalesced()) as f32;
        let misses = self.misses() as f32;

        if reused + misses > 0.0 {
            reused / (reused + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Get the last fetch time for a key
    pub fn fetch_time(&self, key: &CacheKey) -> Option<Duration> {
        self.fetch_times.read().get(key).cloned()
    }

    /// Get all recorded fetch times
    pub fn all_fetch_times(&self) -> HashMap<CacheKey, Duration> {
        self.fetch_times.read().clone()
    }
}

/// A thread-safe wrapper around ReuseMetrics
#[derive(Debug, Clone, Default)]
pub struct ReuseMetricsHandle(Arc<ReuseMetrics>);

impl ReuseMetricsHandle {
    /// Create a new metrics handle
    pub fn new() -> Self {
        Self(Arc::new(ReuseMetrics::new()))
    }
}

impl std::ops::Deref for ReuseMetricsHandle {
    type Target = ReuseMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
