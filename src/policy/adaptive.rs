//! Adaptive LFU/MFU policy.
//!
//! Exclusive entries are split by access count into two pools:
//!
//! ```text
//!             access_count <= threshold          access_count > threshold
//!            ┌───────────────────────────┐      ┌───────────────────────────┐
//!   admit ──▶│ LFU pool  (fraction f)    │      │ MFU pool  (1000 - f)      │◀── admit
//!            └────────────┬──────────────┘      └─────────────┬─────────────┘
//!                         │ evict                             │ evict
//!                         ▼                                   ▼
//!                 LFU ghost list (key → count)        MFU ghost list (key → count)
//! ```
//!
//! Each pool gets its share of the eviction queue budget and evicts its own
//! oldest admissions. A `get` miss on a key in the LFU ghost list means the
//! LFU pool was too small to keep it, so the LFU share `f` grows by the
//! adaptive rate; a miss on a key in the MFU ghost list shrinks it. A step
//! that would leave `[MIN_FRACTION_PROMIL, MAX_FRACTION_PROMIL]` is skipped
//! entirely rather than clamped.
//!
//! Pools are never re-scanned: an entry whose access count crosses the
//! threshold while a client holds it simply lands in MFU the next time it
//! becomes exclusive.

use super::{ExclusivePolicy, ExclusivePool};
use crate::config::adaptive::{MAX_FRACTION_PROMIL, MIN_FRACTION_PROMIL, TOTAL_PROMIL};
use crate::config::AdaptiveCacheConfig;
use crate::entry::Entry;
use crate::metrics::AdaptiveMetrics;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Two-pool policy whose LFU/MFU split adapts to ghost list hits.
pub struct AdaptivePolicy<K, V> {
    lfu: ExclusivePool<K, V>,
    mfu: ExclusivePool<K, V>,
    lfu_fraction_promil: i32,
    adaptive_rate_promil: i32,
    frequently_used_threshold: usize,
    metrics: AdaptiveMetrics,
}

/// `promil` thousandths of `total`, rounded down.
fn share(total: usize, promil: i32) -> usize {
    let promil = u128::try_from(promil).unwrap_or(0);
    let scaled = total as u128 * promil / TOTAL_PROMIL as u128;
    usize::try_from(scaled).unwrap_or(usize::MAX)
}

impl<K: Hash + Eq + Clone, V> AdaptivePolicy<K, V> {
    /// Creates a policy from `config`. Invalid values are replaced by their
    /// defaults with a warning.
    pub fn new(config: AdaptiveCacheConfig) -> Self {
        let config = config.validated();
        let ghost_capacity = usize::try_from(config.ghost_list_max_size).unwrap_or(0);
        AdaptivePolicy {
            lfu: ExclusivePool::new(ghost_capacity),
            mfu: ExclusivePool::new(ghost_capacity),
            lfu_fraction_promil: config.lfu_fraction_promil,
            adaptive_rate_promil: config.adaptive_rate_promil,
            frequently_used_threshold: usize::try_from(config.frequently_used_threshold)
                .unwrap_or(1),
            metrics: AdaptiveMetrics::default(),
        }
    }

    /// Current LFU share of the eviction queue, in promil.
    #[inline]
    pub fn lfu_fraction_promil(&self) -> i32 {
        self.lfu_fraction_promil
    }

    /// Step applied to the LFU share on a ghost list hit.
    #[inline]
    pub fn adaptive_rate_promil(&self) -> i32 {
        self.adaptive_rate_promil
    }

    /// Access count above which entries go to the MFU pool.
    #[inline]
    pub fn frequently_used_threshold(&self) -> usize {
        self.frequently_used_threshold
    }

    /// The least frequently used pool.
    pub fn lfu(&self) -> &ExclusivePool<K, V> {
        &self.lfu
    }

    /// The most frequently used pool.
    pub fn mfu(&self) -> &ExclusivePool<K, V> {
        &self.mfu
    }

    /// Policy counters.
    pub fn metrics(&self) -> &AdaptiveMetrics {
        &self.metrics
    }

    fn update_fraction_on_miss<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.lfu.ghost_hit(key) {
            self.metrics.lfu_ghost_hits += 1;
            if self.lfu_fraction_promil + self.adaptive_rate_promil <= MAX_FRACTION_PROMIL {
                self.lfu_fraction_promil += self.adaptive_rate_promil;
                self.metrics.fraction_increases += 1;
            }
        } else if self.mfu.ghost_hit(key) {
            self.metrics.mfu_ghost_hits += 1;
            if self.lfu_fraction_promil - self.adaptive_rate_promil >= MIN_FRACTION_PROMIL {
                self.lfu_fraction_promil -= self.adaptive_rate_promil;
                self.metrics.fraction_decreases += 1;
            }
        }
    }
}

impl<K, V> ExclusivePolicy<K, V> for AdaptivePolicy<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    fn admit(&mut self, entry: Arc<Entry<K, V>>) {
        if entry.access_count() > self.frequently_used_threshold {
            self.metrics.mfu_admissions += 1;
            self.mfu.put(entry);
        } else {
            self.metrics.lfu_admissions += 1;
            self.lfu.put(entry);
        }
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let from_lfu = self.lfu.remove(key);
        let from_mfu = self.mfu.remove(key);
        from_lfu.or(from_mfu)
    }

    fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lfu.contains(key) || self.mfu.contains(key)
    }

    fn count(&self) -> usize {
        self.lfu.count() + self.mfu.count()
    }

    fn size_in_bytes(&self) -> usize {
        self.lfu.size_in_bytes() + self.mfu.size_in_bytes()
    }

    fn remove_all(&mut self, predicate: &mut dyn FnMut(&K) -> bool) -> Vec<Arc<Entry<K, V>>> {
        let mut removed = self.lfu.remove_all(predicate);
        removed.extend(self.mfu.remove_all(predicate));
        removed
    }

    fn evict(&mut self, max_count: usize, max_size: usize) -> Vec<Arc<Entry<K, V>>> {
        let lfu_max_count = share(max_count, self.lfu_fraction_promil);
        let lfu_max_size = share(max_size, self.lfu_fraction_promil);

        let mut evicted = self.lfu.trim_to(lfu_max_count, lfu_max_size);
        evicted.extend(
            self.mfu
                .trim_to(max_count - lfu_max_count, max_size - lfu_max_size),
        );
        evicted
    }

    fn trim(&mut self, target_size: usize) -> Vec<Arc<Entry<K, V>>> {
        let mfu_size = self.mfu.size_in_bytes();
        let (lfu_target, mfu_target) = if target_size <= mfu_size {
            (0, target_size)
        } else {
            (target_size - mfu_size, mfu_size)
        };

        let mut evicted = self.lfu.trim_to(usize::MAX, lfu_target);
        evicted.extend(self.mfu.trim_to(usize::MAX, mfu_target));
        evicted
    }

    fn probe<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if let Some(entry) = self.remove(key) {
            entry.record_access();
            self.admit(entry);
        }
    }

    fn on_miss<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.update_fraction_on_miss(key);
    }

    fn initial_access_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        // only a key that left LFU carries its count into a new entry
        self.lfu.ghost_access_count(key).unwrap_or(0)
    }

    fn report(&self, metrics: &mut BTreeMap<String, f64>) {
        metrics.insert(
            "lfu_fraction_promil".to_string(),
            f64::from(self.lfu_fraction_promil),
        );
        metrics.insert("lfu_count".to_string(), self.lfu.count() as f64);
        metrics.insert(
            "lfu_size_in_bytes".to_string(),
            self.lfu.size_in_bytes() as f64,
        );
        metrics.insert("mfu_count".to_string(), self.mfu.count() as f64);
        metrics.insert(
            "mfu_size_in_bytes".to_string(),
            self.mfu.size_in_bytes() as f64,
        );
        metrics.insert("lfu_ghost_count".to_string(), self.lfu.ghost_len() as f64);
        metrics.insert("mfu_ghost_count".to_string(), self.mfu.ghost_len() as f64);
        metrics.extend(self.metrics.to_btreemap());
    }

    fn name(&self) -> &'static str {
        "ARC"
    }
}

impl<K: fmt::Debug, V> fmt::Debug for AdaptivePolicy<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePolicy")
            .field("lfu_fraction_promil", &self.lfu_fraction_promil)
            .field("adaptive_rate_promil", &self.adaptive_rate_promil)
            .field("frequently_used_threshold", &self.frequently_used_threshold)
            .field("lfu", &self.lfu)
            .field("mfu", &self.mfu)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CloseableRef;

    fn config(ghost_list_max_size: i32, lfu_fraction_promil: i32) -> AdaptiveCacheConfig {
        AdaptiveCacheConfig {
            adaptive_rate_promil: 10,
            frequently_used_threshold: 1,
            ghost_list_max_size,
            lfu_fraction_promil,
        }
    }

    fn entry(key: u32, size: usize, access_count: usize) -> Arc<Entry<u32, ()>> {
        let entry = Entry::new(key, CloseableRef::of(()), size, None);
        entry.set_access_count(access_count);
        Arc::new(entry)
    }

    #[test]
    fn test_share() {
        assert_eq!(share(10, 500), 5);
        assert_eq!(share(3, 500), 1);
        assert_eq!(share(usize::MAX, 1000), usize::MAX);
        assert_eq!(share(usize::MAX, 900), (usize::MAX as u128 * 9 / 10) as usize);
    }

    #[test]
    fn test_admission_by_access_count() {
        let mut policy = AdaptivePolicy::new(config(0, 500));
        policy.admit(entry(1, 10, 1));
        policy.admit(entry(2, 10, 2));

        assert!(policy.lfu().contains(&1u32));
        assert!(policy.mfu().contains(&2u32));
        assert_eq!(policy.count(), 2);
        assert_eq!(policy.size_in_bytes(), 20);
    }

    #[test]
    fn test_evict_splits_budget_by_fraction() {
        let mut policy = AdaptivePolicy::new(config(4, 500));
        for key in 1..=3 {
            policy.admit(entry(key, 100, 1));
        }
        for key in 11..=13 {
            policy.admit(entry(key, 100, 5));
        }

        // 4 entries allowed: 2 per pool
        let evicted = policy.evict(4, usize::MAX);
        let evicted: Vec<u32> = evicted.iter().map(|e| *e.key()).collect();
        assert_eq!(evicted, vec![1, 11]);
        assert!(policy.lfu().ghost_contains(&1u32));
        assert_eq!(policy.mfu().ghost_access_count(&11u32), Some(5));
    }

    #[test]
    fn test_ghost_hits_move_fraction() {
        let mut policy = AdaptivePolicy::new(config(4, 500));
        policy.admit(entry(1, 100, 1));
        policy.admit(entry(2, 100, 3));
        policy.evict(0, 0);

        policy.on_miss(&1u32);
        assert_eq!(policy.lfu_fraction_promil(), 510);
        assert_eq!(policy.lfu().ghost_access_count(&1u32), Some(2));

        policy.on_miss(&2u32);
        policy.on_miss(&2u32);
        assert_eq!(policy.lfu_fraction_promil(), 490);

        // unknown keys leave the fraction alone
        policy.on_miss(&9u32);
        assert_eq!(policy.lfu_fraction_promil(), 490);
    }

    #[test]
    fn test_fraction_step_is_all_or_nothing() {
        let mut policy = AdaptivePolicy::new(AdaptiveCacheConfig {
            adaptive_rate_promil: 60,
            ..config(4, 850)
        });
        policy.admit(entry(1, 1, 1));
        policy.evict(0, 0);

        policy.on_miss(&1u32);
        assert_eq!(policy.lfu_fraction_promil(), 850);
        // the ghost record is still refreshed
        assert_eq!(policy.lfu().ghost_access_count(&1u32), Some(2));
    }

    #[test]
    fn test_trim_takes_lfu_first() {
        let mut policy = AdaptivePolicy::new(config(0, 500));
        policy.admit(entry(1, 100, 1));
        policy.admit(entry(2, 100, 1));
        policy.admit(entry(3, 100, 2));

        let evicted = policy.trim(150);
        let evicted: Vec<u32> = evicted.iter().map(|e| *e.key()).collect();
        assert_eq!(evicted, vec![1, 2]);
        assert!(policy.mfu().contains(&3u32));

        let evicted = policy.trim(50);
        assert_eq!(evicted.len(), 1);
        assert_eq!(policy.count(), 0);
    }

    #[test]
    fn test_probe_can_promote_to_mfu() {
        let mut policy = AdaptivePolicy::new(config(0, 500));
        policy.admit(entry(1, 10, 1));
        policy.probe(&1u32);
        assert!(policy.mfu().contains(&1u32));
        assert!(!policy.lfu().contains(&1u32));
    }

    #[test]
    fn test_initial_access_count_from_ghosts() {
        let mut policy = AdaptivePolicy::new(config(4, 500));
        policy.admit(entry(1, 10, 1));
        policy.admit(entry(2, 10, 4));
        policy.evict(0, 0);

        assert_eq!(policy.initial_access_count(&1u32), 1);
        assert_eq!(policy.mfu().ghost_access_count(&2u32), Some(4));
        assert_eq!(policy.initial_access_count(&2u32), 0);
        assert_eq!(policy.initial_access_count(&3u32), 0);
    }

    #[test]
    fn test_invalid_config_uses_defaults() {
        let policy: AdaptivePolicy<u32, ()> = AdaptivePolicy::new(AdaptiveCacheConfig {
            adaptive_rate_promil: 0,
            frequently_used_threshold: 1,
            ghost_list_max_size: 0,
            lfu_fraction_promil: 50,
        });
        assert_eq!(policy.lfu_fraction_promil(), 500);
        assert_eq!(policy.adaptive_rate_promil(), 10);
    }
}
