// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use super::controller::{Concurrent, SingleThreaded};
use super::raw::RawTable;

/// A single-threaded open-addressed hash set.
///
/// Backed by a [`RawTable`] with `V = ()`, mirroring `hash_set.h`'s
/// single-threaded `HashSet<K>`.
pub struct HashSet<K, S = RandomState> {
    raw: RawTable<K, (), SingleThreaded, S>,
}

impl<K> HashSet<K, RandomState> {
    pub fn new() -> Self {
        Self {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: RawTable::with_capacity(capacity),
        }
    }
}

impl<K, S> HashSet<K, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.raw.iter().map(|(k, _)| k)
    }
}

impl<K: Hash, S: BuildHasher> HashSet<K, S> {
    /// Inserts `key`. Returns `true` if it was newly inserted, `false` if it
    /// was already present (in which case the set is unchanged).
    pub fn insert(&self, key: K) -> bool {
        self.raw.put(key, ()).is_none()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.erase(key)
    }

    pub fn clear(&self) {
        self.raw.clear()
    }
}

impl<K> Default for HashSet<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-threaded hash set that keeps every `insert`ed occurrence of an
/// equal key as a separate slot, rather than deduplicating.
///
/// Mirrors `hash_set.h`'s single-threaded `HashMultiSet<K>`.
pub struct HashMultiset<K, S = RandomState> {
    raw: RawTable<K, (), SingleThreaded, S>,
}

impl<K> HashMultiset<K, RandomState> {
    pub fn new() -> Self {
        Self {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: RawTable::with_capacity(capacity),
        }
    }
}

impl<K, S> HashMultiset<K, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.raw.iter().map(|(k, _)| k)
    }
}

impl<K: Hash, S: BuildHasher> HashMultiset<K, S> {
    pub fn insert(&self, key: K) {
        self.raw.put_multi(key, ())
    }

    /// Counts how many equal occurrences of `key` are stored.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get_all(key).len()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    /// Removes a single occurrence of `key`.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.erase(key)
    }

    /// Removes every occurrence of `key`, returning how many were removed.
    pub fn remove_all<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove_all(key)
    }

    pub fn clear(&self) {
        self.raw.clear()
    }
}

impl<K> Default for HashMultiset<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe hash set, the [`Concurrent`]-controller counterpart of
/// [`HashSet`].
pub struct ConcurrentHashSet<K, S = RandomState> {
    raw: RawTable<K, (), Concurrent, S>,
}

impl<K> ConcurrentHashSet<K, RandomState> {
    pub fn new() -> Self {
        Self {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: RawTable::with_capacity(capacity),
        }
    }
}

impl<K, S> ConcurrentHashSet<K, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: Hash + Send, S: BuildHasher> ConcurrentHashSet<K, S> {
    pub fn insert(&self, key: K) -> bool {
        self.raw.put(key, ()).is_none()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.erase(key)
    }

    pub fn clear(&self) {
        self.raw.clear()
    }
}

impl<K> Default for ConcurrentHashSet<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe multiset, the [`Concurrent`]-controller counterpart of
/// [`HashMultiset`].
pub struct ConcurrentHashMultiset<K, S = RandomState> {
    raw: RawTable<K, (), Concurrent, S>,
}

impl<K> ConcurrentHashMultiset<K, RandomState> {
    pub fn new() -> Self {
        Self {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: RawTable::with_capacity(capacity),
        }
    }
}

impl<K, S> ConcurrentHashMultiset<K, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: Hash + Send, S: BuildHasher> ConcurrentHashMultiset<K, S> {
    pub fn insert(&self, key: K) {
        self.raw.put_multi(key, ())
    }

    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get_all(key).len()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.erase(key)
    }

    pub fn remove_all<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove_all(key)
    }

    pub fn clear(&self) {
        self.raw.clear()
    }
}

impl<K> Default for ConcurrentHashMultiset<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_insert_is_idempotent() {
        let set = HashSet::new();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert_eq!(set.len(), 1);
        assert!(set.remove("a"));
        assert!(set.is_empty());
    }

    #[test]
    fn multiset_counts_duplicate_occurrences() {
        let ms = HashMultiset::new();
        ms.insert("a");
        ms.insert("a");
        ms.insert("b");
        assert_eq!(ms.count("a"), 2);
        assert_eq!(ms.len(), 3);
        assert!(ms.remove("a"));
        assert_eq!(ms.count("a"), 1);
    }

    #[test]
    fn multiset_remove_all_clears_every_occurrence() {
        let ms = HashMultiset::new();
        ms.insert("a");
        ms.insert("a");
        assert_eq!(ms.remove_all("a"), 2);
        assert!(ms.is_empty());
    }

    #[test]
    fn concurrent_set_survives_parallel_inserts_of_same_keys() {
        let set = Arc::new(ConcurrentHashSet::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let set = Arc::clone(&set);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    set.insert(i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(set.len(), 100);
    }
}
