//! Cache Metrics System
//!
//! Counters kept by every memory cache, reported as a `BTreeMap<String, f64>`
//! through the [`CacheMetrics`] trait. The map doubles as the cache's debug
//! dump: besides the lifetime counters below it carries a snapshot of the
//! current counts and sizes (cached, in use, eviction queue) and any
//! policy-specific values such as the adaptive LFU share.
//!
//! BTreeMap keeps the key order deterministic, so dumps diff cleanly between
//! runs and tests can compare them directly.

use std::collections::BTreeMap;

pub mod adaptive;

pub use adaptive::AdaptiveMetrics;

/// Lifetime counters common to all memory caches.
#[derive(Debug, Default, Clone)]
pub struct CoreCacheMetrics {
    /// Number of `get` calls.
    pub requests: u64,

    /// Number of `get` calls that found a live entry.
    pub cache_hits: u64,

    /// Total bytes of values handed out by `get` hits.
    pub bytes_served_from_cache: u64,

    /// Number of values accepted by `cache`.
    pub insertions: u64,

    /// Total bytes of values accepted by `cache`.
    pub bytes_written_to_cache: u64,

    /// Number of values refused by `cache` because they did not fit.
    pub rejections: u64,

    /// Number of exclusive entries evicted by the size/count limits or a trim.
    pub evictions: u64,

    /// Total bytes of evicted entries.
    pub bytes_evicted: u64,
}

impl CoreCacheMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a `get` that found a live entry of `object_size` bytes.
    pub fn record_hit(&mut self, object_size: usize) {
        self.requests += 1;
        self.cache_hits += 1;
        self.bytes_served_from_cache += object_size as u64;
    }

    /// Records a `get` that found nothing.
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Records an accepted value.
    pub fn record_insertion(&mut self, object_size: usize) {
        self.insertions += 1;
        self.bytes_written_to_cache += object_size as u64;
    }

    /// Records a refused value.
    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    /// Records an evicted entry.
    pub fn record_eviction(&mut self, evicted_size: usize) {
        self.evictions += 1;
        self.bytes_evicted += evicted_size as u64;
    }

    /// Fraction of requests that hit, or 0.0 before the first request.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert(
            "cache_misses".to_string(),
            (self.requests - self.cache_hits) as f64,
        );
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert(
            "bytes_served_from_cache".to_string(),
            self.bytes_served_from_cache as f64,
        );

        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert(
            "bytes_written_to_cache".to_string(),
            self.bytes_written_to_cache as f64,
        );
        metrics.insert("rejections".to_string(), self.rejections as f64);

        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("bytes_evicted".to_string(), self.bytes_evicted as f64);

        metrics
    }
}

/// Uniform metrics reporting for memory caches.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short name of the eviction policy, e.g. `"LRU"` or `"ARC"`.
    fn algorithm_name(&self) -> &'static str;
}
