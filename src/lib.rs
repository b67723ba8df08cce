#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Ownership Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         Life of a cached value                              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   CloseableRef<V> ──cache(k)──▶ Entry { clients: 1 } ──▶ CacheRef<K, V>     │
//! │                                      │                                      │
//! │                       last CacheRef dropped                                 │
//! │                                      ▼                                      │
//! │                          Entry { clients: 0 }  (exclusive)                  │
//! │                          waits in the eviction policy                       │
//! │                       │                         │                           │
//! │                  get(k) again            evict / trim / reuse               │
//! │                       ▼                         ▼                           │
//! │             back to a CacheRef          orphan: value released once         │
//! │                                         no handle is left                   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Eviction queue | Best Use Case |
//! |------|----------------|---------------|
//! | [`CountingMemoryCache`] | one queue, oldest release first | General purpose |
//! | [`AdaptiveCountingMemoryCache`] | LFU + MFU queues with ghost lists | Mixed one-off and repeated access |
//!
//! ## Code Examples
//!
//! ### Single queue
//!
//! ```rust
//! use counting_cache::config::MemoryCacheParams;
//! use counting_cache::{CloseableRef, CountingMemoryCache, MemoryTrimType, SuggestedTrimStrategy};
//! use std::time::Duration;
//!
//! let params = MemoryCacheParams {
//!     max_cache_size: 1024,
//!     max_cache_entries: 16,
//!     max_eviction_queue_size: 512,
//!     max_eviction_queue_entries: 8,
//!     max_cache_entry_size: 256,
//!     params_check_interval: Duration::from_secs(60),
//! };
//! let cache = CountingMemoryCache::new(|v: &Vec<u8>| v.len(), SuggestedTrimStrategy, params);
//!
//! let client = cache.cache(1u32, &CloseableRef::of(vec![0u8; 100])).unwrap();
//! assert!(cache.cache(2u32, &CloseableRef::of(vec![0u8; 300])).is_none()); // too large
//!
//! drop(client);
//! cache.trim(MemoryTrimType::OnAppBackgrounded);
//! assert_eq!(cache.count(), 0);
//! ```
//!
//! ### Adaptive queues
//!
//! ```rust
//! use counting_cache::config::{AdaptiveCacheConfig, MemoryCacheParams};
//! use counting_cache::{AdaptiveCountingMemoryCache, CloseableRef, SuggestedTrimStrategy};
//!
//! let config = AdaptiveCacheConfig {
//!     ghost_list_max_size: 64,
//!     ..AdaptiveCacheConfig::default()
//! };
//! let cache = AdaptiveCountingMemoryCache::new(
//!     |v: &String| v.len(),
//!     SuggestedTrimStrategy,
//!     MemoryCacheParams::default(),
//!     config,
//! );
//!
//! drop(cache.cache("k", &CloseableRef::of(String::from("value"))));
//! assert_eq!(cache.eviction_queue_count(), 1);
//! assert_eq!(cache.lfu_fraction_promil(), 500);
//! ```

/// Doubly linked list implementation with in-place editing capabilities.
///
/// **Note**: This module is internal infrastructure. It exposes unsafe raw
/// pointer operations that require careful invariant maintenance.
pub(crate) mod list;

/// Insertion-ordered map tracking entry count and total byte size.
pub mod lru_map;

/// Bounded, recency-ordered key history used for ghost lists.
pub mod history;

/// Value size computation.
pub mod descriptor;

/// Shared value handles with a release hook.
pub mod reference;

/// Cache entries, client references and exclusivity observers.
pub mod entry;

/// Cache configuration structures.
///
/// Provides the memory cache limits, their supplier, and the adaptive policy
/// tuning.
pub mod config;

/// Memory pressure levels and trim strategies.
pub mod trim;

/// Time sources for params reloads and storage timestamps.
pub mod clock;

/// Eviction policies for exclusively owned entries.
pub mod policy;

/// The reference-counted memory cache.
pub mod cache;

/// Builder for memory caches.
pub mod builder;

/// Cache metrics system.
///
/// Provides counters for every memory cache and a common reporting trait.
pub mod metrics;

/// Disk storage interface and an in-memory implementation.
pub mod storage;

pub use builder::MemoryCacheBuilder;
pub use cache::{AdaptiveCountingMemoryCache, CountingMemoryCache, MemoryCache};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use descriptor::ValueDescriptor;
pub use entry::{CacheRef, Entry, EntryStateObserver};
pub use history::{BoundedHistory, BoundedHistorySet};
pub use lru_map::CountingLruMap;
pub use metrics::CacheMetrics;
pub use policy::{AdaptivePolicy, ExclusivePolicy, LruPolicy};
pub use reference::{CloseableRef, ResourceReleaser};
pub use trim::{CacheTrimStrategy, MemoryTrimType, SuggestedTrimStrategy};
