//! Bounded, recency-ordered history of keys.
//!
//! [`BoundedHistory`] remembers at most `capacity` keys, each with a small
//! payload. Inserting or refreshing a key makes it the most recent one; once
//! the history grows past its capacity, the least recent key is forgotten.
//! Membership checks are O(1) and never change the order.
//!
//! The adaptive cache keeps one history per pool as its "ghost list": the
//! keys it recently evicted, each with the access count it had at the time.
//! [`BoundedHistorySet`] is the payload-free form.
//!
//! ```
//! use counting_cache::BoundedHistorySet;
//!
//! let mut recent = BoundedHistorySet::new(2);
//! recent.add("a");
//! recent.add("b");
//! recent.add("a");     // refresh
//! recent.add("c");     // forgets "b"
//! assert!(recent.contains("a"));
//! assert!(!recent.contains("b"));
//! ```

use crate::list::{List, Node};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// A history of at most `capacity` keys, ordered by last insertion or refresh.
///
/// A capacity of zero is allowed and makes the history remember nothing.
pub struct BoundedHistory<K, T = (), S = DefaultHashBuilder> {
    capacity: usize,
    list: List<(K, T)>,
    map: HashMap<K, *mut Node<(K, T)>, S>,
}

/// A bounded history without payload.
pub type BoundedHistorySet<K, S = DefaultHashBuilder> = BoundedHistory<K, (), S>;

// SAFETY: the history owns all nodes its raw pointers refer to.
unsafe impl<K: Send, T: Send, S: Send> Send for BoundedHistory<K, T, S> {}

// SAFETY: all mutation requires &mut self.
unsafe impl<K: Sync, T: Sync, S: Sync> Sync for BoundedHistory<K, T, S> {}

impl<K: Hash + Eq + Clone, T> BoundedHistory<K, T> {
    /// Creates an empty history that remembers at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, T, S: BuildHasher> BoundedHistory<K, T, S> {
    /// Creates an empty history with a custom hash builder.
    pub fn with_hasher(capacity: usize, hash_builder: S) -> Self {
        BoundedHistory {
            capacity,
            list: List::new(),
            map: HashMap::with_hasher(hash_builder),
        }
    }

    /// Maximum number of remembered keys.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of remembered keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is remembered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns true if `key` is remembered. Does not refresh it.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(key)
    }

    /// Returns the payload of `key` without refreshing it.
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = *self.map.get(key)?;
        // SAFETY: pointers in `map` refer to live nodes of `list`
        unsafe { Some(&(*node).value().1) }
    }

    /// Remembers `key` with `payload` as the most recent entry.
    ///
    /// An existing entry is refreshed and its payload replaced. Returns the
    /// entry that had to be forgotten to stay within capacity, if any.
    pub fn insert(&mut self, key: K, payload: T) -> Option<(K, T)> {
        if self.capacity == 0 {
            return Some((key, payload));
        }

        if let Some(&node) = self.map.get(&key) {
            // SAFETY: node is linked into `list`
            unsafe {
                (*node).value_mut().1 = payload;
                self.list.move_to_front(node);
            }
            return None;
        }

        let node = self.list.push_front((key.clone(), payload));
        self.map.insert(key, node);

        if self.map.len() > self.capacity {
            let (eldest, payload) = self.list.pop_back()?;
            self.map.remove(&eldest);
            return Some((eldest, payload));
        }
        None
    }

    /// Marks `key` as most recent and returns its payload for update.
    pub fn refresh<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = *self.map.get(key)?;
        // SAFETY: node is linked into `list` and uniquely borrowed through
        // &mut self
        unsafe {
            self.list.move_to_front(node);
            Some(&mut (*node).value_mut().1)
        }
    }

    /// Forgets `key`, returning its payload.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.map.remove(key)?;
        // SAFETY: the pointer came out of `map`, so the node is still linked
        let (_, payload) = unsafe { self.list.remove(node) };
        Some(payload)
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    /// Iterates entries from least to most recent.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> + '_ {
        self.list.iter_oldest_first().map(|(k, t)| (k, t))
    }
}

impl<K: Hash + Eq + Clone, S: BuildHasher> BoundedHistory<K, (), S> {
    /// Remembers `key` as the most recent entry.
    #[inline]
    pub fn add(&mut self, key: K) {
        self.insert(key, ());
    }
}

impl<K: fmt::Debug, T: fmt::Debug, S> fmt::Debug for BoundedHistory<K, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedHistory")
            .field("capacity", &self.capacity)
            .field("entries", &self.list)
            .finish()
    }
}
