//! Adaptive Cache Metrics
//!
//! Counters specific to the adaptive LFU/MFU policy. They show how the
//! policy is moving: ghost list hits drive the LFU share up or down, and the
//! admission counters show which pool entries land in when their last
//! client goes away.

use std::collections::BTreeMap;

/// Counters kept by [`AdaptivePolicy`](crate::policy::AdaptivePolicy).
#[derive(Debug, Default, Clone)]
pub struct AdaptiveMetrics {
    /// Misses on keys found in the LFU ghost list.
    pub lfu_ghost_hits: u64,
    /// Misses on keys found in the MFU ghost list.
    pub mfu_ghost_hits: u64,
    /// Times the LFU share grew.
    pub fraction_increases: u64,
    /// Times the LFU share shrank.
    pub fraction_decreases: u64,
    /// Entries admitted to the LFU pool.
    pub lfu_admissions: u64,
    /// Entries admitted to the MFU pool.
    pub mfu_admissions: u64,
}

impl AdaptiveMetrics {
    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("lfu_ghost_hits".to_string(), self.lfu_ghost_hits as f64);
        metrics.insert("mfu_ghost_hits".to_string(), self.mfu_ghost_hits as f64);
        metrics.insert(
            "fraction_increases".to_string(),
            self.fraction_increases as f64,
        );
        metrics.insert(
            "fraction_decreases".to_string(),
            self.fraction_decreases as f64,
        );
        metrics.insert("lfu_admissions".to_string(), self.lfu_admissions as f64);
        metrics.insert("mfu_admissions".to_string(), self.mfu_admissions as f64);
        metrics
    }
}
