//! Cache entries and client references.
//!
//! An [`Entry`] is the cache's record for one key. Besides the value it
//! carries the ownership state the cache's invariants are built on:
//!
//! - `client_count`: live [`CacheRef`]s. An entry with clients is *in use*
//!   and is never evicted.
//! - `orphan`: set once the entry has left the cache (superseded by a newer
//!   value under the same key, removed, evicted or reused). An orphan is
//!   never re-admitted to an eviction queue.
//! - `access_count`: how many client references were handed out, plus any
//!   history carried over from a ghost list. Only the adaptive policy reads it.
//!
//! # State Machine
//!
//! ```text
//!                 get / cache
//!   ┌──────────┐ ◀────────────── ┌─────────────┐
//!   │  in use  │                 │  exclusive  │──── evict / trim / reuse ──┐
//!   │ clients>0│ ──────────────▶ │  clients=0  │                            │
//!   └────┬─────┘  last ref drop  └─────────────┘                            ▼
//!        │ superseded / removed                                      ┌──────────┐
//!        └─────────────────────────────────────────────────────────▶ │  orphan  │
//!                                                                    └──────────┘
//! ```
//!
//! The counters are atomics only so that entries can be shared through `Arc`;
//! every transition happens under the owning cache's lock. The value itself
//! is released when the last `Arc<Entry>` goes away, which can only happen
//! once the entry is orphaned and has no clients left.

use crate::reference::CloseableRef;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Receives exclusivity transitions of a cached entry.
///
/// `is_exclusive == true` means no client holds the entry any more and it
/// became eligible for eviction; `false` means it left the eviction queue,
/// because a client took it again or because it was evicted, trimmed, removed
/// or reused.
///
/// Callbacks run outside the cache lock, after the transition took effect.
/// Transitions made by one thread are reported in order. When several
/// threads touch the same key their callbacks may interleave, so a `false`
/// can arrive after a `true` that happened later. Treat the flag as a hint
/// and ask the cache (or [`Entry::client_count`]) for the current state.
pub trait EntryStateObserver<K>: Send + Sync {
    /// Called when the exclusivity of `key` changes.
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool);
}

impl<K, F> EntryStateObserver<K> for F
where
    F: Fn(&K, bool) + Send + Sync,
{
    #[inline]
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool) {
        self(key, is_exclusive)
    }
}

/// The cache's record for one key.
pub struct Entry<K, V> {
    key: K,
    value: CloseableRef<V>,
    size: usize,
    client_count: AtomicUsize,
    orphan: AtomicBool,
    access_count: AtomicUsize,
    observer: Option<Arc<dyn EntryStateObserver<K>>>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(
        key: K,
        value: CloseableRef<V>,
        size: usize,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Self {
        Entry {
            key,
            value,
            size,
            client_count: AtomicUsize::new(0),
            orphan: AtomicBool::new(false),
            access_count: AtomicUsize::new(0),
            observer,
        }
    }

    /// The entry's key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The cached value handle.
    #[inline]
    pub fn value(&self) -> &CloseableRef<V> {
        &self.value
    }

    /// Size of the value in bytes, as computed when it was cached.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    /// Number of live client references.
    #[inline]
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    /// True once the entry has left the cache.
    #[inline]
    pub fn is_orphan(&self) -> bool {
        self.orphan.load(Ordering::Relaxed)
    }

    /// Number of recorded accesses.
    #[inline]
    pub fn access_count(&self) -> usize {
        self.access_count.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_clients(&self) {
        self.client_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the remaining client count.
    pub(crate) fn decrement_clients(&self) -> usize {
        let previous = self.client_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "client count underflow");
        previous - 1
    }

    pub(crate) fn mark_orphan(&self) {
        self.orphan.store(true, Ordering::Relaxed);
    }

    pub(crate) fn record_access(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_access_count(&self, count: usize) {
        self.access_count.store(count, Ordering::Relaxed);
    }

    pub(crate) fn notify_exclusivity(&self, is_exclusive: bool) {
        if let Some(observer) = &self.observer {
            observer.on_exclusivity_changed(&self.key, is_exclusive);
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("client_count", &self.client_count())
            .field("orphan", &self.is_orphan())
            .field("access_count", &self.access_count())
            .finish()
    }
}

/// Returns a client slot to the cache that handed it out.
pub(crate) trait ClientRelease<K, V>: Send + Sync {
    fn release_client(&self, entry: &Arc<Entry<K, V>>);
}

struct ClientSlot<K, V> {
    entry: Arc<Entry<K, V>>,
    owner: Arc<dyn ClientRelease<K, V>>,
}

impl<K, V> Drop for ClientSlot<K, V> {
    fn drop(&mut self) {
        self.owner.release_client(&self.entry);
    }
}

/// A client's reference to a cached value.
///
/// Holding a `CacheRef` keeps the entry in use: it cannot be evicted and its
/// value cannot be released. Clones share one client slot, so an entry
/// becomes exclusive again when the last clone is dropped or
/// [closed](CacheRef::close).
pub struct CacheRef<K, V> {
    slot: Arc<ClientSlot<K, V>>,
}

impl<K, V> CacheRef<K, V> {
    pub(crate) fn new(entry: Arc<Entry<K, V>>, owner: Arc<dyn ClientRelease<K, V>>) -> Self {
        CacheRef {
            slot: Arc::new(ClientSlot { entry, owner }),
        }
    }

    /// The cached value.
    #[inline]
    pub fn get(&self) -> &V {
        self.slot.entry.value.get()
    }

    /// The key the value was cached under.
    #[inline]
    pub fn key(&self) -> &K {
        &self.slot.entry.key
    }

    /// Size of the value in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.slot.entry.size
    }

    /// The cache entry behind this reference.
    #[inline]
    pub fn entry(&self) -> &Entry<K, V> {
        &self.slot.entry
    }

    /// A handle to the underlying value that is independent of this cache
    /// entry, e.g. to cache the same value under another key or in another
    /// cache without copying it.
    pub fn value_ref(&self) -> CloseableRef<V> {
        self.slot.entry.value.clone()
    }

    /// Releases this reference. Equivalent to `drop(reference)`.
    #[inline]
    pub fn close(self) {}

    /// True if both references point at the same cache entry.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.slot.entry, &other.slot.entry)
    }
}

impl<K, V> Clone for CacheRef<K, V> {
    fn clone(&self) -> Self {
        CacheRef {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<K, V> Deref for CacheRef<K, V> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &V {
        self.get()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheRef<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRef")
            .field("key", self.key())
            .field("value", self.get())
            .finish()
    }
}
