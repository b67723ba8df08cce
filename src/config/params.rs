//! Size and count limits of a memory cache.
//!
//! The limits are not fixed at construction. A cache holds a
//! [`MemoryCacheParamsSupplier`] and asks it for fresh params at most once
//! every [`params_check_interval`](MemoryCacheParams::params_check_interval),
//! so an application can shrink or grow its caches at run time (for example
//! when the device reports a different memory class).
//!
//! # Sizing Guidelines
//!
//! ```text
//!   ┌──────────────────────── max_cache_size ────────────────────────┐
//!   │  in use (held by clients)  │  eviction queue (exclusive)        │
//!   │                            │◀──── max_eviction_queue_size ────▶│
//!   └────────────────────────────┴────────────────────────────────────┘
//! ```
//!
//! - **`max_cache_size` / `max_cache_entries`** bound everything the cache
//!   tracks, including entries clients still hold. Values that would push the
//!   in-use part over these limits are not cached at all.
//! - **`max_eviction_queue_size` / `max_eviction_queue_entries`** bound only
//!   the entries nobody holds. They decide how much "warm" data survives after
//!   clients let go.
//! - **`max_cache_entry_size`** rejects single oversized values up front.
//!
//! # Examples
//!
//! ```
//! use counting_cache::config::MemoryCacheParams;
//! use std::time::Duration;
//!
//! // 64MB budget, at most 256 entries, half of it kept warm.
//! let params = MemoryCacheParams {
//!     max_cache_size: 64 * 1024 * 1024,
//!     max_cache_entries: 256,
//!     max_eviction_queue_size: 32 * 1024 * 1024,
//!     max_eviction_queue_entries: 128,
//!     max_cache_entry_size: 8 * 1024 * 1024,
//!     params_check_interval: Duration::from_secs(300),
//! };
//! assert!(params.max_cache_entry_size <= params.max_cache_size);
//! ```

use std::fmt;
use std::time::Duration;

/// Default interval between two reads of the params supplier.
pub const DEFAULT_PARAMS_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Size and count limits of a memory cache.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheParams {
    /// Maximum total size in bytes of all cached entries.
    pub max_cache_size: usize,
    /// Maximum number of cached entries.
    pub max_cache_entries: usize,
    /// Maximum total size in bytes of the entries no client holds.
    pub max_eviction_queue_size: usize,
    /// Maximum number of entries no client holds.
    pub max_eviction_queue_entries: usize,
    /// Largest single value, in bytes, the cache accepts.
    pub max_cache_entry_size: usize,
    /// Minimum time between two reads of the params supplier.
    pub params_check_interval: Duration,
}

impl MemoryCacheParams {
    /// Params with every limit disabled. Useful for tests and for caches that
    /// are bounded by other means.
    pub fn unbounded() -> Self {
        MemoryCacheParams {
            max_cache_size: usize::MAX,
            max_cache_entries: usize::MAX,
            max_eviction_queue_size: usize::MAX,
            max_eviction_queue_entries: usize::MAX,
            max_cache_entry_size: usize::MAX,
            params_check_interval: DEFAULT_PARAMS_CHECK_INTERVAL,
        }
    }
}

impl Default for MemoryCacheParams {
    /// A 32MB cache of up to 256 entries whose eviction queue may use all of it.
    fn default() -> Self {
        MemoryCacheParams {
            max_cache_size: 32 * 1024 * 1024,
            max_cache_entries: 256,
            max_eviction_queue_size: usize::MAX,
            max_eviction_queue_entries: usize::MAX,
            max_cache_entry_size: usize::MAX,
            params_check_interval: DEFAULT_PARAMS_CHECK_INTERVAL,
        }
    }
}

impl fmt::Debug for MemoryCacheParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheParams")
            .field("max_cache_size", &self.max_cache_size)
            .field("max_cache_entries", &self.max_cache_entries)
            .field("max_eviction_queue_size", &self.max_eviction_queue_size)
            .field(
                "max_eviction_queue_entries",
                &self.max_eviction_queue_entries,
            )
            .field("max_cache_entry_size", &self.max_cache_entry_size)
            .field("params_check_interval", &self.params_check_interval)
            .finish()
    }
}

/// Source of [`MemoryCacheParams`], polled by the cache under its lock.
///
/// Implemented by fixed params and by any `Fn() -> MemoryCacheParams`
/// closure. Suppliers must be cheap and must not call back into the cache.
pub trait MemoryCacheParamsSupplier: Send + Sync {
    /// Returns the params currently in effect.
    fn get(&self) -> MemoryCacheParams;
}

impl MemoryCacheParamsSupplier for MemoryCacheParams {
    #[inline]
    fn get(&self) -> MemoryCacheParams {
        *self
    }
}

impl<F> MemoryCacheParamsSupplier for F
where
    F: Fn() -> MemoryCacheParams + Send + Sync,
{
    #[inline]
    fn get(&self) -> MemoryCacheParams {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fixed_params_supplier() {
        let params = MemoryCacheParams::default();
        assert_eq!(params.get(), params);
    }

    #[test]
    fn test_closure_supplier_is_polled() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let supplier = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            MemoryCacheParams::unbounded()
        };

        assert_eq!(supplier.get().max_cache_size, usize::MAX);
        supplier.get();
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_lists_fields() {
        let debug = format!("{:?}", MemoryCacheParams::default());
        assert!(debug.contains("max_eviction_queue_entries"));
        assert!(debug.contains("params_check_interval"));
    }
}
