//! Reference-counted memory cache.
//!
//! [`MemoryCache`] caches values that are expensive to create and large
//! enough that the cache must account for their size (decoded images,
//! buffers). Values are shared, never copied: [`cache`](MemoryCache::cache)
//! and [`get`](MemoryCache::get) hand out [`CacheRef`]s, and an entry can only
//! be evicted once every client reference to it is gone.
//!
//! # How It Works
//!
//! ```text
//! ┌──────────────────────────── MemoryCache ─────────────────────────────┐
//! │                                                                      │
//! │  Mutex ──▶ cached: CountingLruMap<K, Arc<Entry>>   (every entry)     │
//! │            exclusive: P                            (clients == 0)    │
//! │            params, last_params_check, metrics                        │
//! │                                                                      │
//! │  cache(k, v) ──▶ orphan old entry, admit new one, hand out CacheRef  │
//! │  get(k)      ──▶ take entry out of `exclusive`, hand out CacheRef    │
//! │  drop(ref)   ──▶ last client gone: admit to `exclusive`, evict       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cached entry is *in use* (held by at least one client) or
//! *exclusive* (held by nobody, waiting in the policy `P`). The cache
//! enforces two sets of limits from its [`MemoryCacheParams`]:
//!
//! - a value is only admitted if the in-use part still fits within
//!   `max_cache_size` / `max_cache_entries` with it, and
//! - after every operation the exclusive part is evicted down to
//!   `min(max_eviction_queue_*, max_cache_* - in_use_*)`.
//!
//! Entries held by clients are never evicted, so the cache can temporarily
//! hold more than its limits only through values that were admitted while
//! they fitted.
//!
//! # Concurrency
//!
//! Every operation runs its whole state transition, eviction included,
//! under one `parking_lot::Mutex`. Observer callbacks and value releases are
//! collected while locked and run after the lock is dropped, so they may
//! block or call back into the cache (releasers must not).
//!
//! # Example
//!
//! ```
//! use counting_cache::config::MemoryCacheParams;
//! use counting_cache::{CloseableRef, CountingMemoryCache, SuggestedTrimStrategy};
//!
//! let cache = CountingMemoryCache::new(
//!     |v: &Vec<u8>| v.len(),
//!     SuggestedTrimStrategy,
//!     MemoryCacheParams::default(),
//! );
//!
//! let value = CloseableRef::of(vec![0u8; 1024]);
//! let client = cache.cache("thumbnail", &value).expect("fits");
//! assert_eq!(cache.in_use_count(), 1);
//!
//! drop(client);
//! assert_eq!(cache.eviction_queue_count(), 1);
//!
//! let again = cache.get("thumbnail").expect("still cached");
//! assert_eq!(again.len(), 1024);
//! ```

use crate::builder::MemoryCacheBuilder;
use crate::clock::Clock;
use crate::config::{AdaptiveCacheConfig, MemoryCacheParams, MemoryCacheParamsSupplier};
use crate::descriptor::ValueDescriptor;
use crate::entry::{CacheRef, ClientRelease, Entry, EntryStateObserver};
use crate::lru_map::CountingLruMap;
use crate::metrics::{CacheMetrics, CoreCacheMetrics};
use crate::policy::{AdaptivePolicy, EntrySize, ExclusivePolicy, LruPolicy};
use crate::reference::CloseableRef;
use crate::trim::{clamp_ratio, CacheTrimStrategy, MemoryTrimType};
use log::{debug, trace};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Memory cache with a single, admission-ordered eviction queue.
pub type CountingMemoryCache<K, V> = MemoryCache<K, V, LruPolicy<K, V>>;

/// Memory cache with adaptive LFU/MFU eviction queues and ghost lists.
pub type AdaptiveCountingMemoryCache<K, V> = MemoryCache<K, V, AdaptivePolicy<K, V>>;

/// A thread-safe, reference-counted memory cache with eviction policy `P`.
///
/// See the [module documentation](self) for the ownership model.
pub struct MemoryCache<K, V, P> {
    shared: Arc<CacheShared<K, V, P>>,
}

struct CacheShared<K, V, P> {
    state: Mutex<CacheState<K, V, P>>,
    descriptor: Box<dyn ValueDescriptor<V>>,
    trim_strategy: Box<dyn CacheTrimStrategy>,
    params_supplier: Box<dyn MemoryCacheParamsSupplier>,
    clock: Box<dyn Clock>,
    default_observer: Option<Arc<dyn EntryStateObserver<K>>>,
}

struct CacheState<K, V, P> {
    cached: CountingLruMap<K, Arc<Entry<K, V>>, EntrySize>,
    exclusive: P,
    params: MemoryCacheParams,
    last_params_check: Duration,
    metrics: CoreCacheMetrics,
}

/// Side effects collected under the lock and applied after it is released.
struct Pending<K, V> {
    notifications: Vec<(Arc<Entry<K, V>>, bool)>,
    released: Vec<Arc<Entry<K, V>>>,
}

impl<K, V> Pending<K, V> {
    fn new() -> Self {
        Pending {
            notifications: Vec::new(),
            released: Vec::new(),
        }
    }

    fn notify(&mut self, entry: Arc<Entry<K, V>>, is_exclusive: bool) {
        self.notifications.push((entry, is_exclusive));
    }

    fn release(&mut self, entry: Arc<Entry<K, V>>) {
        self.released.push(entry);
    }

    /// Must be called without holding the cache lock.
    fn finish(self) {
        for (entry, is_exclusive) in &self.notifications {
            entry.notify_exclusivity(*is_exclusive);
        }
        // dropping the last Arc of an orphan releases its value
        drop(self);
    }
}

impl<K, V, P> CacheState<K, V, P>
where
    K: Hash + Eq + Clone,
    P: ExclusivePolicy<K, V>,
{
    fn in_use_count(&self) -> usize {
        self.cached.count() - self.exclusive.count()
    }

    fn in_use_size(&self) -> usize {
        self.cached.size_in_bytes() - self.exclusive.size_in_bytes()
    }

    /// Admission check for a value of `size` bytes replacing whatever is
    /// cached under `key`. A client-held entry under `key` would be orphaned
    /// by the insert, so its share of the in-use totals does not count.
    fn can_cache(&self, key: &K, size: usize) -> bool {
        let params = &self.params;
        let (mut in_use_count, mut in_use_size) = (self.in_use_count(), self.in_use_size());
        if !self.exclusive.contains(key) {
            if let Some(old) = self.cached.get(key) {
                in_use_count -= 1;
                in_use_size -= old.size_in_bytes();
            }
        }
        size <= params.max_cache_entry_size
            && in_use_count < params.max_cache_entries
            && size <= params.max_cache_size.saturating_sub(in_use_size)
    }

    /// Drops evicted entries from the cached map and marks them orphans.
    fn discard_evicted(&mut self, evicted: Vec<Arc<Entry<K, V>>>, pending: &mut Pending<K, V>) {
        if evicted.is_empty() {
            return;
        }
        debug!(
            "{}: evicted {} exclusive entries, {} left",
            self.exclusive.name(),
            evicted.len(),
            self.exclusive.count()
        );
        for entry in evicted {
            if let Some(cached) = self.cached.remove(entry.key()) {
                pending.release(cached);
            }
            entry.mark_orphan();
            self.metrics.record_eviction(entry.size_in_bytes());
            pending.notify(entry, false);
        }
    }

    fn remove_matching(
        &mut self,
        predicate: &mut dyn FnMut(&K) -> bool,
        pending: &mut Pending<K, V>,
    ) -> usize {
        let exclusives = self.exclusive.remove_all(predicate);
        let removed = self.cached.remove_all(&mut *predicate);
        let count = removed.len();
        for (_, entry) in removed {
            entry.mark_orphan();
            pending.release(entry);
        }
        for entry in exclusives {
            pending.notify(entry, false);
        }
        count
    }
}

impl<K, V, P> CacheShared<K, V, P>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: ExclusivePolicy<K, V> + 'static,
{
    fn new_client_ref(self: &Arc<Self>, entry: Arc<Entry<K, V>>) -> CacheRef<K, V> {
        entry.increment_clients();
        entry.record_access();
        let owner: Arc<dyn ClientRelease<K, V>> = self.clone();
        CacheRef::new(entry, owner)
    }

    fn maybe_update_params(&self, state: &mut CacheState<K, V, P>) {
        let now = self.clock.now();
        match state
            .last_params_check
            .checked_add(state.params.params_check_interval)
        {
            Some(due) if due <= now => {}
            _ => return,
        }
        state.last_params_check = now;
        state.params = self.params_supplier.get();
        debug!("reloaded memory cache params: {:?}", state.params);
    }

    fn maybe_evict(&self, state: &mut CacheState<K, V, P>, pending: &mut Pending<K, V>) {
        let params = state.params;
        let max_count = params
            .max_eviction_queue_entries
            .min(params.max_cache_entries.saturating_sub(state.in_use_count()));
        let max_size = params
            .max_eviction_queue_size
            .min(params.max_cache_size.saturating_sub(state.in_use_size()));
        let evicted = state.exclusive.evict(max_count, max_size);
        state.discard_evicted(evicted, pending);
    }
}

impl<K, V, P> ClientRelease<K, V> for CacheShared<K, V, P>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: ExclusivePolicy<K, V> + 'static,
{
    fn release_client(&self, entry: &Arc<Entry<K, V>>) {
        let mut pending = Pending::new();
        {
            let mut state = self.state.lock();
            if entry.decrement_clients() == 0 && !entry.is_orphan() {
                state.exclusive.admit(Arc::clone(entry));
                pending.notify(Arc::clone(entry), true);
            }
            self.maybe_update_params(&mut state);
            self.maybe_evict(&mut state, &mut pending);
        }
        pending.finish();
    }
}

impl<K, V, P> MemoryCache<K, V, P>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: ExclusivePolicy<K, V> + 'static,
{
    pub(crate) fn from_parts(
        policy: P,
        descriptor: Box<dyn ValueDescriptor<V>>,
        trim_strategy: Box<dyn CacheTrimStrategy>,
        params_supplier: Box<dyn MemoryCacheParamsSupplier>,
        clock: Box<dyn Clock>,
        default_observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Self {
        let params = params_supplier.get();
        let last_params_check = clock.now();
        debug!("creating {} memory cache with {:?}", policy.name(), params);
        MemoryCache {
            shared: Arc::new(CacheShared {
                state: Mutex::new(CacheState {
                    cached: CountingLruMap::new(EntrySize),
                    exclusive: policy,
                    params,
                    last_params_check,
                    metrics: CoreCacheMetrics::new(),
                }),
                descriptor,
                trim_strategy,
                params_supplier,
                clock,
                default_observer,
            }),
        }
    }

    /// Caches `value` under `key` and returns a client reference to it.
    ///
    /// The cache keeps its own handle to the value; the caller may drop
    /// `value` right away. Any entry previously cached under `key` is
    /// superseded: it disappears from the cache but stays valid for clients
    /// still holding it, and its value is released after the last of them
    /// lets go.
    ///
    /// Returns `None` if the value does not fit: larger than
    /// `max_cache_entry_size`, or the entries currently in use leave no room
    /// for it. A rejected value leaves the cache untouched, including any
    /// entry already cached under `key`.
    pub fn cache(&self, key: K, value: &CloseableRef<V>) -> Option<CacheRef<K, V>> {
        let observer = self.shared.default_observer.clone();
        self.cache_entry(key, value, observer)
    }

    /// Like [`cache`](Self::cache), reporting exclusivity changes of the new
    /// entry to `observer` instead of the cache's default observer.
    pub fn cache_with_observer(
        &self,
        key: K,
        value: &CloseableRef<V>,
        observer: Arc<dyn EntryStateObserver<K>>,
    ) -> Option<CacheRef<K, V>> {
        self.cache_entry(key, value, Some(observer))
    }

    fn cache_entry(
        &self,
        key: K,
        value: &CloseableRef<V>,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Option<CacheRef<K, V>> {
        let size = self.shared.descriptor.size_in_bytes(value.get());
        let mut pending = Pending::new();
        let client = {
            let mut state = self.shared.state.lock();
            self.shared.maybe_update_params(&mut state);

            let client = if state.can_cache(&key, size) {
                if let Some(old_exclusive) = state.exclusive.remove(&key) {
                    pending.notify(old_exclusive, false);
                }
                if let Some(old) = state.cached.remove(&key) {
                    old.mark_orphan();
                    pending.release(old);
                }

                let entry = Entry::new(key.clone(), value.clone(), size, observer);
                entry.set_access_count(state.exclusive.initial_access_count(&key));
                let entry = Arc::new(entry);
                state.cached.put(key, Arc::clone(&entry));
                state.metrics.record_insertion(size);
                Some(self.shared.new_client_ref(entry))
            } else {
                trace!("rejected value of {} bytes", size);
                state.metrics.record_rejection();
                None
            };

            self.shared.maybe_evict(&mut state, &mut pending);
            client
        };
        pending.finish();
        client
    }

    /// Returns a client reference to the value cached under `key`.
    ///
    /// An exclusive entry leaves the eviction queue and its observer is told
    /// it is no longer exclusive.
    pub fn get<Q>(&self, key: &Q) -> Option<CacheRef<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut pending = Pending::new();
        let client = {
            let mut state = self.shared.state.lock();
            if let Some(old_exclusive) = state.exclusive.remove(key) {
                pending.notify(old_exclusive, false);
            }

            let cached = state.cached.get(key).cloned();
            let client = match cached {
                Some(entry) => {
                    state.metrics.record_hit(entry.size_in_bytes());
                    Some(self.shared.new_client_ref(entry))
                }
                None => {
                    state.metrics.record_miss();
                    state.exclusive.on_miss(key);
                    None
                }
            };

            self.shared.maybe_update_params(&mut state);
            self.shared.maybe_evict(&mut state, &mut pending);
            client
        };
        pending.finish();
        client
    }

    /// Refreshes the position of an exclusive entry in the eviction queue,
    /// without handing out a reference. The adaptive policy also counts it as
    /// an access.
    pub fn probe<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared.state.lock().exclusive.probe(key);
    }

    /// Takes an exclusive entry out of the cache and returns its value.
    ///
    /// The returned handle is no longer tracked by the cache, so the value
    /// can be modified and cached again, under any key, without a copy.
    /// Returns `None` if `key` is absent or held by a client.
    pub fn reuse<Q>(&self, key: &Q) -> Option<CloseableRef<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut pending = Pending::new();
        let value = {
            let mut state = self.shared.state.lock();
            let exclusive = state.exclusive.remove(key);
            match exclusive {
                Some(entry) => {
                    if let Some(cached) = state.cached.remove(key) {
                        pending.release(cached);
                    }
                    entry.mark_orphan();
                    let value = entry.value().clone();
                    pending.notify(entry, false);
                    Some(value)
                }
                None => None,
            }
        };
        pending.finish();
        value
    }

    /// Returns true if `key` is cached, in use or exclusive.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared.state.lock().cached.contains(key)
    }

    /// Returns true if any cached key matches `predicate`.
    pub fn contains_matching<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&K) -> bool,
    {
        self.shared.state.lock().cached.any_key(predicate)
    }

    /// Removes every entry whose key matches `predicate` and returns how many
    /// were removed. Exclusive entries are released right away, entries in
    /// use once their clients let go.
    pub fn remove_all<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut pending = Pending::new();
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = state.remove_matching(&mut predicate, &mut pending);
            self.shared.maybe_update_params(&mut state);
            self.shared.maybe_evict(&mut state, &mut pending);
            removed
        };
        pending.finish();
        removed
    }

    /// Removes every entry. Entries in use are released once their clients
    /// let go.
    pub fn clear(&self) {
        let mut pending = Pending::new();
        {
            let mut state = self.shared.state.lock();
            state.remove_matching(&mut |_: &K| true, &mut pending);
            self.shared.maybe_update_params(&mut state);
        }
        pending.finish();
    }

    /// Frees memory in response to pressure of the given level.
    ///
    /// The trim strategy's ratio `r` sets the target total size to
    /// `(1 - r) * size_in_bytes()`; exclusive entries are evicted until the
    /// target is met or none are left. Entries in use are kept.
    pub fn trim(&self, trim_type: MemoryTrimType) {
        let ratio = clamp_ratio(self.shared.trim_strategy.trim_ratio(trim_type));
        let mut pending = Pending::new();
        {
            let mut state = self.shared.state.lock();
            let target_cache_size = (state.cached.size_in_bytes() as f64 * (1.0 - ratio)) as usize;
            let target_queue_size = target_cache_size.saturating_sub(state.in_use_size());
            debug!(
                "trimming for {:?}: ratio {}, eviction queue target {} bytes",
                trim_type, ratio, target_queue_size
            );
            let evicted = state.exclusive.trim(target_queue_size);
            state.discard_evicted(evicted, &mut pending);
            self.shared.maybe_update_params(&mut state);
            self.shared.maybe_evict(&mut state, &mut pending);
        }
        pending.finish();
    }

    /// Number of cached entries, in use or exclusive.
    pub fn count(&self) -> usize {
        self.shared.state.lock().cached.count()
    }

    /// Total size of cached entries, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.shared.state.lock().cached.size_in_bytes()
    }

    /// Number of exclusive entries.
    pub fn eviction_queue_count(&self) -> usize {
        self.shared.state.lock().exclusive.count()
    }

    /// Total size of exclusive entries, in bytes.
    pub fn eviction_queue_size_in_bytes(&self) -> usize {
        self.shared.state.lock().exclusive.size_in_bytes()
    }

    /// Number of entries held by at least one client.
    pub fn in_use_count(&self) -> usize {
        self.shared.state.lock().in_use_count()
    }

    /// Total size of entries held by at least one client, in bytes.
    pub fn in_use_size_in_bytes(&self) -> usize {
        self.shared.state.lock().in_use_size()
    }

    /// The params currently in effect.
    pub fn params(&self) -> MemoryCacheParams {
        self.shared.state.lock().params
    }

    /// `max_cache_size` of the params currently in effect.
    pub fn max_cache_size(&self) -> usize {
        self.params().max_cache_size
    }

    /// Runs `f` on the eviction policy under the cache lock.
    ///
    /// `f` must not call into this cache or drop a [`CacheRef`] from it.
    pub fn inspect_policy<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.shared.state.lock().exclusive)
    }

    /// Snapshot of counters, sizes and policy state. Same as
    /// [`CacheMetrics::metrics`].
    pub fn debug_data(&self) -> BTreeMap<String, f64> {
        let state = self.shared.state.lock();
        let mut metrics = state.metrics.to_btreemap();
        metrics.insert("cached_count".to_string(), state.cached.count() as f64);
        metrics.insert(
            "cached_size_in_bytes".to_string(),
            state.cached.size_in_bytes() as f64,
        );
        metrics.insert("in_use_count".to_string(), state.in_use_count() as f64);
        metrics.insert(
            "in_use_size_in_bytes".to_string(),
            state.in_use_size() as f64,
        );
        metrics.insert(
            "eviction_queue_count".to_string(),
            state.exclusive.count() as f64,
        );
        metrics.insert(
            "eviction_queue_size_in_bytes".to_string(),
            state.exclusive.size_in_bytes() as f64,
        );
        metrics.insert(
            "max_cache_size".to_string(),
            state.params.max_cache_size as f64,
        );
        metrics.insert(
            "max_cache_entries".to_string(),
            state.params.max_cache_entries as f64,
        );
        state.exclusive.report(&mut metrics);
        metrics
    }
}

impl<K, V> CountingMemoryCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache with a single eviction queue.
    pub fn new<D, T, S>(descriptor: D, trim_strategy: T, params_supplier: S) -> Self
    where
        D: ValueDescriptor<V> + 'static,
        T: CacheTrimStrategy + 'static,
        S: MemoryCacheParamsSupplier + 'static,
    {
        MemoryCacheBuilder::new(descriptor)
            .trim_strategy(trim_strategy)
            .params_supplier(params_supplier)
            .build()
    }
}

impl<K, V> AdaptiveCountingMemoryCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache with adaptive LFU/MFU eviction queues. Invalid tuning
    /// values in `config` are replaced by their defaults.
    pub fn new<D, T, S>(
        descriptor: D,
        trim_strategy: T,
        params_supplier: S,
        config: AdaptiveCacheConfig,
    ) -> Self
    where
        D: ValueDescriptor<V> + 'static,
        T: CacheTrimStrategy + 'static,
        S: MemoryCacheParamsSupplier + 'static,
    {
        MemoryCacheBuilder::new(descriptor)
            .trim_strategy(trim_strategy)
            .params_supplier(params_supplier)
            .build_adaptive(config)
    }

    /// Current LFU share of the eviction queue, in promil.
    pub fn lfu_fraction_promil(&self) -> i32 {
        self.inspect_policy(AdaptivePolicy::lfu_fraction_promil)
    }
}

impl<K, V, P> CacheMetrics for MemoryCache<K, V, P>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: ExclusivePolicy<K, V> + 'static,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.debug_data()
    }

    fn algorithm_name(&self) -> &'static str {
        self.shared.state.lock().exclusive.name()
    }
}

impl<K, V, P> fmt::Debug for MemoryCache<K, V, P>
where
    K: Hash + Eq + Clone,
    P: ExclusivePolicy<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MemoryCache")
            .field("policy", &state.exclusive.name())
            .field("count", &state.cached.count())
            .field("size_in_bytes", &state.cached.size_in_bytes())
            .field("eviction_queue_count", &state.exclusive.count())
            .field("params", &state.params)
            .finish()
    }
}
