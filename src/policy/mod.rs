//! Eviction policies for exclusively owned entries.
//!
//! A memory cache tracks two populations: entries some client holds (*in
//! use*) and entries nobody holds (*exclusive*). Only exclusive entries can
//! be evicted, and the [`ExclusivePolicy`] decides where they wait and in
//! which order they go.
//!
//! Every policy is built from [`ExclusivePool`]s: an admission-ordered
//! [`CountingLruMap`] of entries plus an optional ghost list remembering the
//! keys it evicted.
//!
//! | Policy | Pools | Ghost lists | Behaviour |
//! |--------|-------|-------------|-----------|
//! | [`LruPolicy`] | 1 | none | oldest admission evicted first |
//! | [`AdaptivePolicy`] | LFU + MFU | one per pool | split adapts to ghost list hits |

use crate::descriptor::ValueDescriptor;
use crate::entry::Entry;
use crate::history::BoundedHistory;
use crate::lru_map::CountingLruMap;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

pub mod adaptive;
pub mod lru;

pub use adaptive::AdaptivePolicy;
pub use lru::LruPolicy;

/// Where exclusive entries wait and how they are chosen for eviction.
///
/// All methods run under the owning cache's lock. Entries returned from
/// [`evict`](ExclusivePolicy::evict) and [`trim`](ExclusivePolicy::trim) have
/// already left the policy; the cache removes them from its own map and
/// releases them after unlocking.
pub trait ExclusivePolicy<K, V>: Send {
    /// Takes an entry whose last client just went away.
    fn admit(&mut self, entry: Arc<Entry<K, V>>);

    /// Removes `key` if it is exclusive.
    fn remove<Q>(&mut self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// Returns true if `key` is exclusive.
    fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// Number of exclusive entries.
    fn count(&self) -> usize;

    /// Total size of exclusive entries, in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Removes every exclusive entry whose key matches `predicate`.
    fn remove_all(&mut self, predicate: &mut dyn FnMut(&K) -> bool) -> Vec<Arc<Entry<K, V>>>;

    /// Evicts until at most `max_count` entries and `max_size` bytes remain.
    fn evict(&mut self, max_count: usize, max_size: usize) -> Vec<Arc<Entry<K, V>>>;

    /// Evicts until at most `target_size` bytes remain.
    fn trim(&mut self, target_size: usize) -> Vec<Arc<Entry<K, V>>>;

    /// Refreshes `key` in place if it is exclusive.
    fn probe<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// Called when `get` finds no live entry for `key`.
    fn on_miss<Q>(&mut self, _key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
    }

    /// Access count a new entry for `key` starts from.
    fn initial_access_count<Q>(&self, _key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        0
    }

    /// Adds policy-specific values to a metrics dump.
    fn report(&self, _metrics: &mut BTreeMap<String, f64>) {}

    /// Short policy name used in metrics.
    fn name(&self) -> &'static str;
}

/// Sizes pool entries by the size recorded on the entry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntrySize;

impl<K, V> ValueDescriptor<Arc<Entry<K, V>>> for EntrySize {
    #[inline]
    fn size_in_bytes(&self, entry: &Arc<Entry<K, V>>) -> usize {
        entry.size_in_bytes()
    }
}

/// An admission-ordered pool of exclusive entries with a ghost list of the
/// keys it evicted and their access counts.
pub struct ExclusivePool<K, V> {
    entries: CountingLruMap<K, Arc<Entry<K, V>>, EntrySize>,
    ghosts: BoundedHistory<K, usize>,
}

impl<K: Hash + Eq + Clone, V> ExclusivePool<K, V> {
    /// Creates an empty pool whose ghost list remembers `ghost_capacity` keys.
    pub fn new(ghost_capacity: usize) -> Self {
        ExclusivePool {
            entries: CountingLruMap::new(EntrySize),
            ghosts: BoundedHistory::new(ghost_capacity),
        }
    }

    /// Number of entries.
    #[inline]
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Total size of the entries, in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.entries.size_in_bytes()
    }

    /// Returns true if `key` is in the pool.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entries.contains(key)
    }

    /// Keys in admission order, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }

    /// Returns true if the ghost list remembers `key`.
    #[inline]
    pub fn ghost_contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.ghosts.contains(key)
    }

    /// Access count the ghost list remembers for `key`.
    #[inline]
    pub fn ghost_access_count<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.ghosts.get(key).copied()
    }

    /// Ghost list keys, least recent first.
    pub fn ghost_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.ghosts.iter().map(|(k, _)| k)
    }

    /// Number of keys in the ghost list.
    #[inline]
    pub fn ghost_len(&self) -> usize {
        self.ghosts.len()
    }

    pub(crate) fn put(&mut self, entry: Arc<Entry<K, V>>) {
        self.entries.put(entry.key().clone(), entry);
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entries.remove(key)
    }

    pub(crate) fn remove_all(
        &mut self,
        predicate: &mut dyn FnMut(&K) -> bool,
    ) -> Vec<Arc<Entry<K, V>>> {
        self.entries
            .remove_all(predicate)
            .into_iter()
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Evicts oldest entries until both limits hold, recording each evicted
    /// key in the ghost list.
    pub(crate) fn trim_to(&mut self, max_count: usize, max_size: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut evicted = Vec::new();
        while self.entries.count() > max_count || self.entries.size_in_bytes() > max_size {
            let Some((key, entry)) = self.entries.pop_oldest() else {
                break;
            };
            self.ghosts.insert(key, entry.access_count());
            evicted.push(entry);
        }
        evicted
    }

    /// Counts a missed access against a remembered key and refreshes it.
    /// Returns false if the key is not remembered.
    pub(crate) fn ghost_hit<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.ghosts.refresh(key) {
            Some(access_count) => {
                *access_count += 1;
                true
            }
            None => false,
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for ExclusivePool<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusivePool")
            .field("entries", &self.entries)
            .field("ghosts", &self.ghosts)
            .finish()
    }
}
