//! Tuning of the adaptive LFU/MFU cache.
//!
//! The adaptive cache splits its eviction queue into two pools: entries
//! accessed at most `frequently_used_threshold` times (LFU) and entries
//! accessed more often (MFU). The LFU pool gets `lfu_fraction_promil`
//! thousandths of the queue budget and the MFU pool the rest. Misses on
//! recently evicted keys move the split by `adaptive_rate_promil`, within
//! `[MIN_FRACTION_PROMIL, MAX_FRACTION_PROMIL]`.
//!
//! Values are signed so that any caller input can be represented; invalid
//! ones never fail construction. [`AdaptiveCacheConfig::validated`] logs a
//! warning through the `log` facade and substitutes the default.
//!
//! ```
//! use counting_cache::config::AdaptiveCacheConfig;
//!
//! let config = AdaptiveCacheConfig {
//!     lfu_fraction_promil: 2000,
//!     ..AdaptiveCacheConfig::default()
//! }
//! .validated();
//! assert_eq!(config.lfu_fraction_promil, 500);
//! ```

use log::warn;
use std::fmt;

/// Parts per thousand in a whole.
pub const TOTAL_PROMIL: i32 = 1000;
/// Smallest share of the eviction queue either pool may get.
pub const MIN_FRACTION_PROMIL: i32 = 100;
/// Largest share of the eviction queue the LFU pool may get.
pub const MAX_FRACTION_PROMIL: i32 = TOTAL_PROMIL - MIN_FRACTION_PROMIL;
/// Initial LFU share.
pub const DEFAULT_LFU_FRACTION_PROMIL: i32 = 500;
/// Step by which a ghost list hit moves the LFU share.
pub const DEFAULT_ADAPTIVE_RATE_PROMIL: i32 = 10;
/// Access count above which an entry counts as frequently used.
pub const DEFAULT_FREQUENTLY_USED_THRESHOLD: i32 = 1;
/// Ghost lists are disabled unless a size is configured.
pub const DEFAULT_GHOST_LIST_MAX_SIZE: i32 = 0;

/// Tuning of an [`AdaptiveCountingMemoryCache`](crate::AdaptiveCountingMemoryCache).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveCacheConfig {
    /// Step, in promil, applied to the LFU share on a ghost list hit.
    /// Must be in `(0, 1000)`.
    pub adaptive_rate_promil: i32,
    /// Entries accessed more than this many times go to the MFU pool.
    /// Must be at least 1.
    pub frequently_used_threshold: i32,
    /// Capacity of each ghost list. Must not be negative.
    pub ghost_list_max_size: i32,
    /// Initial LFU share of the eviction queue, in promil.
    /// Must be in `[MIN_FRACTION_PROMIL, MAX_FRACTION_PROMIL]`.
    pub lfu_fraction_promil: i32,
}

impl AdaptiveCacheConfig {
    /// Returns a copy with every out-of-range value replaced by its default.
    pub fn validated(self) -> Self {
        let mut config = self;

        if !(MIN_FRACTION_PROMIL..=MAX_FRACTION_PROMIL).contains(&config.lfu_fraction_promil) {
            warn!(
                "illegal lfu fraction {}, expected [{}, {}]; using {}",
                config.lfu_fraction_promil,
                MIN_FRACTION_PROMIL,
                MAX_FRACTION_PROMIL,
                DEFAULT_LFU_FRACTION_PROMIL
            );
            config.lfu_fraction_promil = DEFAULT_LFU_FRACTION_PROMIL;
        }

        if config.adaptive_rate_promil <= 0 || config.adaptive_rate_promil >= TOTAL_PROMIL {
            warn!(
                "illegal adaptive rate {}, expected (0, {}); using {}",
                config.adaptive_rate_promil, TOTAL_PROMIL, DEFAULT_ADAPTIVE_RATE_PROMIL
            );
            config.adaptive_rate_promil = DEFAULT_ADAPTIVE_RATE_PROMIL;
        }

        if config.frequently_used_threshold < 1 {
            warn!(
                "illegal frequently used threshold {}; using {}",
                config.frequently_used_threshold, DEFAULT_FREQUENTLY_USED_THRESHOLD
            );
            config.frequently_used_threshold = DEFAULT_FREQUENTLY_USED_THRESHOLD;
        }

        if config.ghost_list_max_size < 0 {
            warn!(
                "illegal ghost list size {}; using {}",
                config.ghost_list_max_size, DEFAULT_GHOST_LIST_MAX_SIZE
            );
            config.ghost_list_max_size = DEFAULT_GHOST_LIST_MAX_SIZE;
        }

        config
    }
}

impl Default for AdaptiveCacheConfig {
    fn default() -> Self {
        AdaptiveCacheConfig {
            adaptive_rate_promil: DEFAULT_ADAPTIVE_RATE_PROMIL,
            frequently_used_threshold: DEFAULT_FREQUENTLY_USED_THRESHOLD,
            ghost_list_max_size: DEFAULT_GHOST_LIST_MAX_SIZE,
            lfu_fraction_promil: DEFAULT_LFU_FRACTION_PROMIL,
        }
    }
}

impl fmt::Debug for AdaptiveCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveCacheConfig")
            .field("adaptive_rate_promil", &self.adaptive_rate_promil)
            .field("frequently_used_threshold", &self.frequently_used_threshold)
            .field("ghost_list_max_size", &self.ghost_list_max_size)
            .field("lfu_fraction_promil", &self.lfu_fraction_promil)
            .finish()
    }
}
