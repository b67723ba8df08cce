//! Insertion-ordered map with aggregate count and byte size.
//!
//! `CountingLruMap` keeps its entries in insertion order, oldest first. It
//! remembers the byte size of every value, as reported by a
//! [`ValueDescriptor`], and keeps the total up to date on every mutation, so
//! both [`count`](CountingLruMap::count) and
//! [`size_in_bytes`](CountingLruMap::size_in_bytes) are O(1).
//!
//! Reads never reorder. Only [`put`](CountingLruMap::put) moves a key, to the
//! newest position, which makes the map a FIFO of *admissions*: the memory
//! cache uses it both for the set of all cached entries and for the
//! eviction queues, where "oldest admitted" is exactly what gets evicted.
//!
//! ```text
//!   put(a) put(b) put(c) put(a)
//!
//!   oldest ──▶ newest
//!   [ b | c | a ]          first_key() == b
//! ```
//!
//! # Example
//!
//! ```
//! use counting_cache::CountingLruMap;
//!
//! let mut map = CountingLruMap::new(|v: &Vec<u8>| v.len());
//! map.put("a", vec![0; 10]);
//! map.put("b", vec![0; 20]);
//! map.put("a", vec![0; 5]);
//!
//! assert_eq!(map.count(), 2);
//! assert_eq!(map.size_in_bytes(), 25);
//! assert_eq!(map.first_key(), Some(&"b"));
//! ```

use crate::descriptor::ValueDescriptor;
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

struct Slot<K, V> {
    key: K,
    value: V,
    size: usize,
}

/// An insertion-ordered map that tracks entry count and total byte size.
///
/// # Safety
///
/// The `map` field holds raw pointers into `list`. A pointer is valid as long
/// as its node has not been removed from the list and the map has not been
/// dropped. Every removal goes through the map first, so no dangling pointer
/// is ever dereferenced.
pub struct CountingLruMap<K, V, D, S = DefaultHashBuilder> {
    list: List<Slot<K, V>>,
    map: HashMap<K, *mut Node<Slot<K, V>>, S>,
    descriptor: D,
    size_in_bytes: usize,
}

// SAFETY: the map owns all nodes and the raw pointers only point at nodes it
// owns. Sharing across threads requires external synchronization, which the
// memory cache provides with its lock.
unsafe impl<K: Send, V: Send, D: Send, S: Send> Send for CountingLruMap<K, V, D, S> {}

// SAFETY: all mutation requires &mut self; shared references cannot race.
unsafe impl<K: Sync, V: Sync, D: Sync, S: Sync> Sync for CountingLruMap<K, V, D, S> {}

impl<K: Hash + Eq + Clone, V, D: ValueDescriptor<V>> CountingLruMap<K, V, D> {
    /// Creates an empty map that sizes values with `descriptor`.
    pub fn new(descriptor: D) -> Self {
        Self::with_hasher(descriptor, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V, D: ValueDescriptor<V>, S: BuildHasher> CountingLruMap<K, V, D, S> {
    /// Creates an empty map with a custom hash builder.
    pub fn with_hasher(descriptor: D, hash_builder: S) -> Self {
        CountingLruMap {
            list: List::new(),
            map: HashMap::with_hasher(hash_builder),
            descriptor,
            size_in_bytes: 0,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn count(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the map holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sum of the sizes of all values, in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// Returns the oldest key, if any.
    pub fn first_key(&self) -> Option<&K> {
        self.list.back().map(|slot| &slot.key)
    }

    /// Returns the value for `key` without changing its position.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = *self.map.get(key)?;
        // SAFETY: pointers in `map` always refer to live nodes of `list`
        unsafe { Some(&(*node).value().value) }
    }

    /// Returns true if `key` is present. Does not change its position.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(key)
    }

    /// Inserts `value` under `key` at the newest position.
    ///
    /// If the key was already present its old value is removed first and
    /// returned; the aggregates then reflect only the new value.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.remove(&key);
        let size = self.descriptor.size_in_bytes(&value);
        let node = self.list.push_front(Slot {
            key: key.clone(),
            value,
            size,
        });
        self.map.insert(key, node);
        self.size_in_bytes += size;
        previous
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.map.remove(key)?;
        // SAFETY: the pointer came out of `map`, so the node is still linked
        let slot = unsafe { self.list.remove(node) };
        self.size_in_bytes -= slot.size;
        Some(slot.value)
    }

    /// Removes and returns the oldest entry.
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        let slot = self.list.pop_back()?;
        self.map.remove(&slot.key);
        self.size_in_bytes -= slot.size;
        Some((slot.key, slot.value))
    }

    /// Removes every entry whose key matches `predicate` and returns the
    /// removed entries, oldest first.
    pub fn remove_all<F>(&mut self, mut predicate: F) -> Vec<(K, V)>
    where
        F: FnMut(&K) -> bool,
    {
        let matching: Vec<K> = self
            .list
            .iter_oldest_first()
            .filter(|slot| predicate(&slot.key))
            .map(|slot| slot.key.clone())
            .collect();

        matching
            .into_iter()
            .filter_map(|key| {
                let value = self.remove(&key)?;
                Some((key, value))
            })
            .collect()
    }

    /// Removes every entry and returns them, oldest first.
    pub fn clear(&mut self) -> Vec<(K, V)> {
        let mut removed = Vec::with_capacity(self.count());
        while let Some(entry) = self.pop_oldest() {
            removed.push(entry);
        }
        removed
    }

    /// Returns the entries whose key matches `predicate`, oldest first.
    pub fn matching_entries<F>(&self, mut predicate: F) -> Vec<(&K, &V)>
    where
        F: FnMut(&K) -> bool,
    {
        self.list
            .iter_oldest_first()
            .filter(|slot| predicate(&slot.key))
            .map(|slot| (&slot.key, &slot.value))
            .collect()
    }

    /// Returns true if any key matches `predicate`.
    pub fn any_key<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&K) -> bool,
    {
        self.list.iter_oldest_first().any(|slot| predicate(&slot.key))
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.list
            .iter_oldest_first()
            .map(|slot| (&slot.key, &slot.value))
    }

    /// Iterates keys oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.list.iter_oldest_first().map(|slot| &slot.key)
    }
}

impl<K: fmt::Debug, V, D, S> fmt::Debug for CountingLruMap<K, V, D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingLruMap")
            .field("count", &self.list.len())
            .field("size_in_bytes", &self.size_in_bytes)
            .field(
                "keys",
                &self
                    .list
                    .iter_oldest_first()
                    .map(|slot| &slot.key)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestMap = CountingLruMap<&'static str, usize, fn(&usize) -> usize>;

    fn make_map() -> TestMap {
        fn identity(v: &usize) -> usize {
            *v
        }
        CountingLruMap::new(identity as fn(&usize) -> usize)
    }

    fn keys(map: &TestMap) -> Vec<&'static str> {
        map.keys().copied().collect()
    }

    #[test]
    fn test_initial_state() {
        let map = make_map();
        assert_eq!(map.count(), 0);
        assert_eq!(map.size_in_bytes(), 0);
        assert!(map.is_empty());
        assert!(map.first_key().is_none());
    }

    #[test]
    fn test_put_appends_newest() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);

        assert_eq!(map.count(), 3);
        assert_eq!(map.size_in_bytes(), 360);
        assert_eq!(keys(&map), vec!["key1", "key2", "key3"]);
        assert_eq!(map.first_key(), Some(&"key1"));
    }

    #[test]
    fn test_put_existing_key_moves_to_newest() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);

        let old = map.put("key2", 150);
        assert_eq!(old, Some(120));
        assert_eq!(map.count(), 3);
        assert_eq!(map.size_in_bytes(), 390);
        assert_eq!(keys(&map), vec!["key1", "key3", "key2"]);
        assert_eq!(map.get("key2"), Some(&150));
    }

    #[test]
    fn test_get_and_contains_do_not_reorder() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);

        assert_eq!(map.get("key1"), Some(&110));
        assert!(map.contains("key1"));
        assert!(map.get("key4").is_none());
        assert!(!map.contains("key4"));
        assert_eq!(keys(&map), vec!["key1", "key2", "key3"]);
    }

    #[test]
    fn test_remove() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);

        assert_eq!(map.remove("key2"), Some(120));
        assert_eq!(map.count(), 2);
        assert_eq!(map.size_in_bytes(), 240);
        assert_eq!(keys(&map), vec!["key1", "key3"]);

        assert!(map.remove("key2").is_none());
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn test_remove_all_returns_matches_in_order() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);
        map.put("key4", 140);

        let removed = map.remove_all(|k| *k == "key2" || *k == "key3");
        assert_eq!(removed, vec![("key2", 120), ("key3", 130)]);
        assert_eq!(map.count(), 2);
        assert_eq!(map.size_in_bytes(), 250);
        assert_eq!(keys(&map), vec!["key1", "key4"]);
    }

    #[test]
    fn test_clear() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);

        let removed = map.clear();
        assert_eq!(removed, vec![("key1", 110), ("key2", 120)]);
        assert_eq!(map.count(), 0);
        assert_eq!(map.size_in_bytes(), 0);
    }

    #[test]
    fn test_matching_entries() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);
        map.put("key3", 130);

        let matching = map.matching_entries(|k| *k != "key1");
        assert_eq!(matching, vec![(&"key2", &120), (&"key3", &130)]);
        assert!(map.any_key(|k| *k == "key3"));
        assert!(!map.any_key(|k| *k == "key9"));
        // non-destructive
        assert_eq!(map.count(), 3);
    }

    #[test]
    fn test_pop_oldest() {
        let mut map = make_map();
        map.put("key1", 110);
        map.put("key2", 120);

        assert_eq!(map.pop_oldest(), Some(("key1", 110)));
        assert_eq!(map.first_key(), Some(&"key2"));
        assert_eq!(map.size_in_bytes(), 120);
        assert_eq!(map.pop_oldest(), Some(("key2", 120)));
        assert!(map.pop_oldest().is_none());
    }

    #[test]
    fn test_owned_keys_with_borrowed_lookup() {
        let mut map = CountingLruMap::new(|v: &Vec<u8>| v.len());
        map.put(String::from("a"), vec![1, 2, 3]);
        assert!(map.contains("a"));
        assert_eq!(map.get("a").map(Vec::len), Some(3));
        assert_eq!(map.remove("a"), Some(vec![1, 2, 3]));
    }
}
