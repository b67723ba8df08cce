//! Single-queue policy: exclusive entries are evicted in the order they
//! became exclusive.

use super::{ExclusivePolicy, ExclusivePool};
use crate::entry::Entry;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// One eviction queue ordered by admission, no ghost list.
pub struct LruPolicy<K, V> {
    pool: ExclusivePool<K, V>,
}

impl<K: Hash + Eq + Clone, V> LruPolicy<K, V> {
    /// Creates an empty policy.
    pub fn new() -> Self {
        LruPolicy {
            pool: ExclusivePool::new(0),
        }
    }

    /// The eviction queue.
    pub fn pool(&self) -> &ExclusivePool<K, V> {
        &self.pool
    }
}

impl<K: Hash + Eq + Clone, V> Default for LruPolicy<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExclusivePolicy<K, V> for LruPolicy<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    fn admit(&mut self, entry: Arc<Entry<K, V>>) {
        self.pool.put(entry);
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.pool.remove(key)
    }

    fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.pool.contains(key)
    }

    fn count(&self) -> usize {
        self.pool.count()
    }

    fn size_in_bytes(&self) -> usize {
        self.pool.size_in_bytes()
    }

    fn remove_all(&mut self, predicate: &mut dyn FnMut(&K) -> bool) -> Vec<Arc<Entry<K, V>>> {
        self.pool.remove_all(predicate)
    }

    fn evict(&mut self, max_count: usize, max_size: usize) -> Vec<Arc<Entry<K, V>>> {
        self.pool.trim_to(max_count, max_size)
    }

    fn trim(&mut self, target_size: usize) -> Vec<Arc<Entry<K, V>>> {
        self.pool.trim_to(usize::MAX, target_size)
    }

    fn probe<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if let Some(entry) = self.pool.remove(key) {
            self.pool.put(entry);
        }
    }

    fn name(&self) -> &'static str {
        "LRU"
    }
}

impl<K: fmt::Debug, V> fmt::Debug for LruPolicy<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruPolicy")
            .field("pool", &self.pool)
            .finish()
    }
}
