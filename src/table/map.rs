// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use super::controller::{Concurrent, SingleThreaded};
use super::raw::{Iter, RawTable};

/// A single-threaded open-addressed hash map, replacing the existing value
/// on a key collision.
///
/// Mirrors `hash_map.h`'s single-threaded `HashMap<K, V>`.
pub struct HashMap<K, V, S = RandomState> {
    raw: RawTable<K, V, SingleThreaded, S>,
}

impl<K, V> HashMap<K, V, RandomState> {
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

impl<K, V, S> HashMap<K, V, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V, SingleThreaded, S> {
        self.raw.iter()
    }
}

impl<K: Hash, V, S: BuildHasher> HashMap<K, V, S> {
    /// Inserts `value` under `key`, returning the previous value if the key
    /// was already present.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.raw.put(key, value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get(key)
    }

    /// Removes and returns the value stored under `key`, if present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove(key)
    }

    /// Removes the entry for `key`. Returns whether one was present.
    pub fn erase<Q>(&self, key: &Q) -> bool
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

impl<K, V> Default for HashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-threaded open-addressed hash map that keeps every value put
/// under a colliding key, rather than replacing it.
///
/// Mirrors `hash_map.h`'s single-threaded `HashMultiMap<K, V>`.
pub struct HashMultimap<K, V, S = RandomState> {
    raw: RawTable<K, V, SingleThreaded, S>,
}

impl<K, V> HashMultimap<K, V, RandomState> {
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

impl<K, V, S> HashMultimap<K, V, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V, SingleThreaded, S> {
        self.raw.iter()
    }
}

impl<K: Hash, V, S: BuildHasher> HashMultimap<K, V, S> {
    /// Always inserts a new entry for `key`, even if one already exists.
    pub fn put(&self, key: K, value: V) {
        self.raw.put_multi(key, value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    /// Collects every value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get_all(key)
    }

    /// Removes a single entry matching `key`, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove(key)
    }

    /// Removes every entry matching `key`, returning how many were removed.
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

impl<K, V> Default for HashMultimap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe open-addressed hash map. Identical API to [`HashMap`],
/// parameterized with the [`Concurrent`] controller so `put`/`get`/`remove`
/// may be called from multiple threads concurrently.
pub struct ConcurrentHashMap<K, V, S = RandomState> {
    raw: RawTable<K, V, Concurrent, S>,
}

impl<K, V> ConcurrentHashMap<K, V, RandomState> {
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

impl<K, V, S> ConcurrentHashMap<K, V, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: Hash + Send, V: Send, S: BuildHasher> ConcurrentHashMap<K, V, S> {
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.raw.put(key, value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove(key)
    }

    pub fn erase<Q>(&self, key: &Q) -> bool
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

impl<K, V> Default for ConcurrentHashMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe multimap, the [`Concurrent`]-controller counterpart of
/// [`HashMultimap`].
pub struct ConcurrentHashMultimap<K, V, S = RandomState> {
    raw: RawTable<K, V, Concurrent, S>,
}

impl<K, V> ConcurrentHashMultimap<K, V, RandomState> {
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

impl<K, V, S> ConcurrentHashMultimap<K, V, S> {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: Hash + Send, V: Send, S: BuildHasher> ConcurrentHashMultimap<K, V, S> {
    pub fn put(&self, key: K, value: V) {
        self.raw.put_multi(key, value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.get_all(key)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.raw.remove(key)
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

impl<K, V> Default for ConcurrentHashMultimap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}
