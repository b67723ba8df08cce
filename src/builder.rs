//! Builder for memory caches.
//!
//! Only the value descriptor is required; everything else has a default:
//!
//! | Setting | Default |
//! |---------|---------|
//! | params supplier | [`MemoryCacheParams::default()`] |
//! | trim strategy | [`SuggestedTrimStrategy`] |
//! | clock | [`MonotonicClock`] |
//! | observer | none |
//!
//! ## Example
//!
//! ```rust
//! use counting_cache::builder::MemoryCacheBuilder;
//! use counting_cache::config::{AdaptiveCacheConfig, MemoryCacheParams};
//! use counting_cache::AdaptiveCountingMemoryCache;
//!
//! let cache: AdaptiveCountingMemoryCache<u64, Vec<u8>> = MemoryCacheBuilder::new(|v: &Vec<u8>| v.len())
//!     .params(MemoryCacheParams::unbounded())
//!     .observer(|key: &u64, exclusive: bool| println!("{key}: exclusive={exclusive}"))
//!     .build_adaptive(AdaptiveCacheConfig::default());
//!
//! assert_eq!(cache.lfu_fraction_promil(), 500);
//! ```

use crate::cache::{AdaptiveCountingMemoryCache, CountingMemoryCache, MemoryCache};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{AdaptiveCacheConfig, MemoryCacheParams, MemoryCacheParamsSupplier};
use crate::descriptor::ValueDescriptor;
use crate::entry::EntryStateObserver;
use crate::policy::{AdaptivePolicy, ExclusivePolicy, LruPolicy};
use crate::trim::{CacheTrimStrategy, SuggestedTrimStrategy};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Builder for [`MemoryCache`] instances.
pub struct MemoryCacheBuilder<K, V> {
    descriptor: Box<dyn ValueDescriptor<V>>,
    trim_strategy: Box<dyn CacheTrimStrategy>,
    params_supplier: Box<dyn MemoryCacheParamsSupplier>,
    clock: Box<dyn Clock>,
    observer: Option<Arc<dyn EntryStateObserver<K>>>,
}

impl<K, V> MemoryCacheBuilder<K, V> {
    /// Starts a builder for values sized by `descriptor`.
    pub fn new<D>(descriptor: D) -> Self
    where
        D: ValueDescriptor<V> + 'static,
    {
        Self {
            descriptor: Box::new(descriptor),
            trim_strategy: Box::new(SuggestedTrimStrategy),
            params_supplier: Box::new(MemoryCacheParams::default()),
            clock: Box::new(MonotonicClock::new()),
            observer: None,
        }
    }

    /// Sets the strategy that maps memory pressure to a trim ratio.
    pub fn trim_strategy<T>(mut self, trim_strategy: T) -> Self
    where
        T: CacheTrimStrategy + 'static,
    {
        self.trim_strategy = Box::new(trim_strategy);
        self
    }

    /// Sets the source of cache limits. It is polled again once every
    /// `params_check_interval` of the params it last returned.
    pub fn params_supplier<S>(mut self, params_supplier: S) -> Self
    where
        S: MemoryCacheParamsSupplier + 'static,
    {
        self.params_supplier = Box::new(params_supplier);
        self
    }

    /// Uses fixed limits.
    pub fn params(self, params: MemoryCacheParams) -> Self {
        self.params_supplier(params)
    }

    /// Sets the clock that throttles params reloads.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Sets the observer attached to entries created by
    /// [`MemoryCache::cache`].
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: EntryStateObserver<K> + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }
}

impl<K, V> MemoryCacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Builds a cache with a single eviction queue.
    pub fn build(self) -> CountingMemoryCache<K, V> {
        self.build_with_policy(LruPolicy::new())
    }

    /// Builds a cache with adaptive LFU/MFU eviction queues.
    pub fn build_adaptive(self, config: AdaptiveCacheConfig) -> AdaptiveCountingMemoryCache<K, V> {
        self.build_with_policy(AdaptivePolicy::new(config))
    }

    /// Builds a cache around a custom eviction policy.
    pub fn build_with_policy<P>(self, policy: P) -> MemoryCache<K, V, P>
    where
        P: ExclusivePolicy<K, V> + 'static,
    {
        MemoryCache::from_parts(
            policy,
            self.descriptor,
            self.trim_strategy,
            self.params_supplier,
            self.clock,
            self.observer,
        )
    }
}

impl<K, V> fmt::Debug for MemoryCacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheBuilder")
            .field("params", &self.params_supplier.get())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
