//! Cache Configuration Module
//!
//! Configuration structs for the memory caches. Like the rest of the crate's
//! configuration, they are plain structs with public fields:
//!
//! - **Simple**: create the struct with all fields set, or start from
//!   `Default` and override what you need
//! - **Never fails**: out-of-range tuning is corrected, not rejected
//!
//! | Config | Used by | Description |
//! |--------|---------|-------------|
//! | [`MemoryCacheParams`] | every memory cache | size/count limits, re-read at run time |
//! | [`AdaptiveCacheConfig`] | [`AdaptiveCountingMemoryCache`](crate::AdaptiveCountingMemoryCache) | LFU/MFU split and ghost lists |
//!
//! # Examples
//!
//! ```
//! use counting_cache::config::{AdaptiveCacheConfig, MemoryCacheParams};
//!
//! let params = MemoryCacheParams {
//!     max_cache_size: 1024 * 1024,
//!     max_cache_entries: 64,
//!     ..MemoryCacheParams::default()
//! };
//! let tuning = AdaptiveCacheConfig {
//!     ghost_list_max_size: 32,
//!     ..AdaptiveCacheConfig::default()
//! };
//! assert_eq!(params.max_cache_entries, 64);
//! assert_eq!(tuning.lfu_fraction_promil, 500);
//! ```

pub mod adaptive;
pub mod params;

pub use adaptive::AdaptiveCacheConfig;
pub use params::{MemoryCacheParams, MemoryCacheParamsSupplier};
