// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::borrow::Borrow;
use std::cell::UnsafeCell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::controller::{Controller, Tag};

const INITIAL_TABLE_SIZE: usize = 128;

struct Slot<K, V, T> {
    hash: UnsafeCell<u64>,
    tag: T,
    storage: UnsafeCell<MaybeUninit<(K, V)>>,
}

impl<K, V, T: Tag> Slot<K, V, T> {
    fn new() -> Self {
        Self {
            hash: UnsafeCell::new(0),
            tag: T::default(),
            storage: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    fn occupied(&self) -> bool {
        self.tag.occupied()
    }

    fn hash(&self) -> u64 {
        unsafe { *self.hash.get() }
    }

    /// # Safety
    /// Caller must have observed `occupied()` (or hold exclusive access, as
    /// during rehash) so the payload is fully initialized.
    unsafe fn entry(&self) -> &(K, V) {
        (*self.storage.get()).assume_init_ref()
    }

    /// # Safety
    /// Caller must have observed `occupied()`, and must not alias this with
    /// any other live reference to the slot.
    #[allow(clippy::mut_from_ref)]
    unsafe fn entry_mut(&self) -> &mut (K, V) {
        (*self.storage.get()).assume_init_mut()
    }

    /// Writes `(key, value)` into a slot previously claimed with
    /// `tag.occupy_if_free()`, then publishes it as occupied.
    ///
    /// # Safety
    /// Caller must hold the tentative claim on this slot and must not call
    /// this on an already-occupied slot.
    unsafe fn set(&self, hash: u64, entry: (K, V)) {
        *self.hash.get() = hash;
        (*self.storage.get()).write(entry);
        self.tag.mark_occupied();
    }

    /// Drops the payload and releases the slot back to unoccupied.
    ///
    /// # Safety
    /// Caller must have observed `occupied()` and own exclusive access to
    /// the slot for the duration of the drop.
    unsafe fn release(&self) -> (K, V) {
        let value = (*self.storage.get()).assume_init_read();
        self.tag.release();
        value
    }
}

/// The shared open-addressing engine behind every container in this module.
///
/// `C` supplies table geometry (bucket size, bucket count) and the
/// concurrency policy (`enter`/`exit`/`lock`/`unlock`); `C::Tag` supplies the
/// per-slot occupancy state. `HashMap`/`HashMultimap` instantiate this with
/// `V` as the value type; `HashSet`/`HashMultiset` instantiate it with
/// `V = ()`.
///
/// Mirrors `__HashTable::HashTable` in `include/core/hash_table.h`.
pub(crate) struct RawTable<K, V, C: Controller, S = RandomState> {
    controller: C,
    slots: UnsafeCell<Box<[Slot<K, V, C::Tag>]>>,
    len: AtomicUsize,
    hash_builder: S,
}

unsafe impl<K: Send, V: Send, S: Send> Sync for RawTable<K, V, super::controller::Concurrent, S> {}

impl<K, V, C: Controller, S: Default> RawTable<K, V, C, S> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_TABLE_SIZE)
    }

    pub fn with_capacity(initial_size: usize) -> Self {
        let controller = C::default();
        controller.init(initial_size.max(1));
        let table_size = controller.table_size();
        let slots: Box<[Slot<K, V, C::Tag>]> =
            (0..table_size).map(|_| Slot::new()).collect::<Vec<_>>().into_boxed_slice();
        Self {
            controller,
            slots: UnsafeCell::new(slots),
            len: AtomicUsize::new(0),
            hash_builder: S::default(),
        }
    }
}

impl<K, V, C: Controller, S> RawTable<K, V, C, S> {
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> &[Slot<K, V, C::Tag>] {
        unsafe { &*self.slots.get() }
    }

    fn slot(&self, i: usize) -> &Slot<K, V, C::Tag> {
        &self.slots()[i]
    }
}

impl<K: Hash, V, C: Controller, S: BuildHasher> RawTable<K, V, C, S> {
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Scans the probe range for `hash`/`key`, returning the slot index.
    pub fn find_index<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.controller.enter();
        let mut range = self.controller.hash_range(hash);
        let result = loop {
            let slot = self.slot(range.pos);
            if slot.occupied() && slot.hash() == hash {
                let matches = unsafe { slot.entry().0.borrow() == key };
                if matches {
                    break Some(range.pos);
                }
            }
            range.advance();
            if !range.non_empty() {
                break None;
            }
        };
        self.controller.exit();
        result
    }

    /// Starting range for a multi-match scan over a single key (used by
    /// multimap/multiset iteration-by-key); pair with [`Self::find_next`].
    pub fn find_range(&self, hash: u64) -> super::controller::HashRange {
        self.controller.hash_range(hash)
    }

    pub fn find_next<Q>(&self, range: &mut super::controller::HashRange, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        loop {
            let pos = range.pos;
            let slot = self.slot(pos);
            let is_match = slot.occupied() && slot.hash() == hash && unsafe { slot.entry().0.borrow() == key };
            range.advance();
            if is_match {
                return Some(pos);
            }
            if !range.non_empty() {
                return None;
            }
        }
    }

    /// Claims a free slot for `hash`, growing and rehashing the table as
    /// many times as necessary.
    fn get_free_index(&self, hash: u64) -> usize {
        loop {
            let mut range = self.controller.hash_range(hash);
            let mut collisions = 1usize;
            loop {
                let slot = self.slot(range.pos);
                if slot.tag.occupy_if_free() {
                    return range.pos;
                }
                if slot.hash() == hash {
                    collisions += 1;
                }
                range.advance();
                if !range.non_empty() {
                    break;
                }
            }
            self.resize(collisions);
        }
    }

    /// Finds an existing slot for `key`, or claims a free one if absent,
    /// resizing as needed. Returns the index; callers distinguish
    /// found-vs-fresh via `slot.occupied()`.
    pub fn find_or_get_free_index<Q>(&self, hash: u64, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        loop {
            let mut range = self.controller.hash_range(hash);
            let mut collisions = 1usize;
            loop {
                let slot = self.slot(range.pos);
                if slot.tag.occupy_if_free() {
                    return range.pos;
                }
                if slot.hash() == hash {
                    if slot.occupied() && unsafe { slot.entry().0.borrow() == key } {
                        return range.pos;
                    }
                    collisions += 1;
                }
                range.advance();
                if !range.non_empty() {
                    break;
                }
            }
            self.resize(collisions);
        }
    }

    fn resize(&self, hash_collisions: usize) {
        let len = self.len();
        if self.controller.needs_expand_bucket(hash_collisions) || self.controller.table_size() >= 2 * len.max(1) {
            let snapshot = self.controller.bucket_size();
            self.controller.lock();
            let old_table_size = self.controller.increase_bucket_size(snapshot, hash_collisions);
            if old_table_size != 0 {
                if self.controller.table_size() == len {
                    self.controller.increase_number_of_buckets(self.controller.n_buckets());
                }
                self.rehash(old_table_size);
            }
            self.controller.unlock();
        } else {
            let snapshot = self.controller.n_buckets();
            self.controller.lock();
            let old_table_size = self.controller.increase_number_of_buckets(snapshot);
            if old_table_size != 0 {
                self.rehash(old_table_size);
            }
            self.controller.unlock();
        }
    }

    /// Allocates a table of the (already-grown) current geometry and moves
    /// every occupied entry from the old array into it. Called only while
    /// the controller lock guarantees no resident readers.
    fn rehash(&self, old_table_size: usize) {
        let new_table_size = self.controller.table_size();
        let new_slots: Box<[Slot<K, V, C::Tag>]> =
            (0..new_table_size).map(|_| Slot::new()).collect::<Vec<_>>().into_boxed_slice();

        unsafe {
            let old_slots = &*self.slots.get();
            for old in old_slots.iter().take(old_table_size) {
                if old.occupied() {
                    let hash = old.hash();
                    let entry = old.release();
                    let idx = self.get_free_index_no_resize_in(&new_slots, hash);
                    new_slots[idx].set(hash, entry);
                }
            }
            *self.slots.get() = new_slots;
        }
    }

    fn get_free_index_no_resize_in(&self, slots: &[Slot<K, V, C::Tag>], hash: u64) -> usize {
        let mut range = self.controller.hash_range(hash);
        loop {
            if slots[range.pos].tag.occupy_if_free() {
                return range.pos;
            }
            range.advance();
            if !range.non_empty() {
                unreachable!("rehash exceeded probe range");
            }
        }
    }

    /// Inserts or replaces the mapping for `key`, returning the previous
    /// value if one was replaced. Mirrors `HashMap::put` (replace-on-match).
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.controller.enter();
        let hash = self.hash_of(&key);
        let i = self.find_or_get_free_index(hash, &key);
        let slot = self.slot(i);
        let result = if slot.occupied() {
            let entry = unsafe { slot.entry_mut() };
            Some(std::mem::replace(&mut entry.1, value))
        } else {
            unsafe { slot.set(hash, (key, value)) };
            self.len.fetch_add(1, Ordering::Relaxed);
            None
        };
        self.controller.exit();
        result
    }

    /// Always inserts a new slot, even if `key` already has entries.
    /// Mirrors `HashMultiMap::put`.
    pub fn put_multi(&self, key: K, value: V) {
        self.controller.enter();
        let hash = self.hash_of(&key);
        let i = self.get_free_index(hash);
        unsafe { self.slot(i).set(hash, (key, value)) };
        self.len.fetch_add(1, Ordering::Relaxed);
        self.controller.exit();
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.find_index(hash, key).is_some()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.controller.enter();
        let result = self
            .find_index_raw(hash, key)
            .map(|i| unsafe { &self.slot(i).entry().1 });
        self.controller.exit();
        result
    }

    fn find_index_raw<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut range = self.controller.hash_range(hash);
        loop {
            let slot = self.slot(range.pos);
            if slot.occupied() && slot.hash() == hash && unsafe { slot.entry().0.borrow() == key } {
                return Some(range.pos);
            }
            range.advance();
            if !range.non_empty() {
                return None;
            }
        }
    }

    /// Removes the mapping for `key`, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.controller.enter();
        let result = match self.find_index_raw(hash, key) {
            Some(i) => {
                let (_, v) = unsafe { self.slot(i).release() };
                self.len.fetch_sub(1, Ordering::Relaxed);
                Some(v)
            }
            None => None,
        };
        self.controller.exit();
        result
    }

    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.controller.enter();
        self.controller.lock();
        for slot in self.slots().iter() {
            if slot.occupied() {
                unsafe {
                    slot.release();
                }
            }
        }
        self.len.store(0, Ordering::Relaxed);
        self.controller.unlock();
        self.controller.exit();
    }

    /// Collects every value stored under `key`. Used by multimap/multiset,
    /// whose `put_multi` may have inserted several slots for the same key.
    pub fn get_all<Q>(&self, key: &Q) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.controller.enter();
        let mut range = self.find_range(hash);
        let mut results = Vec::new();
        while let Some(i) = self.find_next(&mut range, hash, key) {
            results.push(unsafe { &self.slot(i).entry().1 });
        }
        self.controller.exit();
        results
    }

    /// Removes every slot matching `key`, returning how many were removed.
    pub fn remove_all<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.controller.enter();
        self.controller.lock();
        let mut range = self.find_range(hash);
        let mut count = 0usize;
        while let Some(i) = self.find_next(&mut range, hash, key) {
            unsafe {
                self.slot(i).release();
            }
            count += 1;
        }
        if count > 0 {
            self.len.fetch_sub(count, Ordering::Relaxed);
        }
        self.controller.unlock();
        self.controller.exit();
        count
    }

    pub fn iter(&self) -> Iter<'_, K, V, C, S> {
        self.controller.enter();
        let slots = self.slots();
        let mut i = 0;
        if self.is_empty() {
            i = slots.len();
        } else {
            while i < slots.len() && !slots[i].occupied() {
                i += 1;
            }
        }
        Iter {
            table: self,
            index: i,
            _marker: PhantomData,
        }
    }
}

impl<K, V, C: Controller, S: Default> Default for RawTable<K, V, C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: Controller, S> Drop for RawTable<K, V, C, S> {
    fn drop(&mut self) {
        let slots = unsafe { &*self.slots.get() };
        for slot in slots.iter() {
            if slot.occupied() {
                unsafe {
                    slot.release();
                }
            }
        }
    }
}

/// Forward iterator over occupied entries, matching
/// `HashTable::HashTableIterator`'s reader registration: `enter()` on
/// construction, `exit()` on drop.
pub(crate) struct Iter<'a, K, V, C: Controller, S> {
    table: &'a RawTable<K, V, C, S>,
    index: usize,
    _marker: PhantomData<&'a (K, V)>,
}

impl<'a, K, V, C: Controller, S> Iterator for Iter<'a, K, V, C, S> {
    type Item = &'a (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let slots = self.table.slots();
        if self.index >= slots.len() {
            return None;
        }
        let entry = unsafe { slots[self.index].entry() };
        self.index += 1;
        while self.index < slots.len() && !slots[self.index].occupied() {
            self.index += 1;
        }
        Some(entry)
    }
}

impl<'a, K, V, C: Controller, S> Drop for Iter<'a, K, V, C, S> {
    fn drop(&mut self) {
        self.table.controller.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::controller::SingleThreaded;

    #[test]
    fn put_get_contains_roundtrip() {
        let table: RawTable<String, i32, SingleThreaded> = RawTable::new();
        table.put("a".to_string(), 1);
        table.put("b".to_string(), 2);
        assert_eq!(table.get("a"), Some(&1));
        assert!(table.contains("b"));
        assert!(!table.contains("c"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn put_replaces_existing_value() {
        let table: RawTable<&str, i32, SingleThreaded> = RawTable::new();
        table.put("a", 1);
        let prev = table.put("a", 2);
        assert_eq!(prev, Some(1));
        assert_eq!(table.get("a"), Some(&2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_returns_value_and_shrinks_len() {
        let table: RawTable<&str, i32, SingleThreaded> = RawTable::new();
        table.put("a", 1);
        assert_eq!(table.remove("a"), Some(1));
        assert_eq!(table.len(), 0);
        assert_eq!(table.remove("a"), None);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let table: RawTable<i32, i32, SingleThreaded> = RawTable::with_capacity(4);
        for i in 0..5000 {
            table.put(i, i * 2);
        }
        assert_eq!(table.len(), 5000);
        for i in 0..5000 {
            assert_eq!(table.get(&i), Some(&(i * 2)));
        }
    }

    #[test]
    fn iter_visits_every_entry() {
        let table: RawTable<i32, i32, SingleThreaded> = RawTable::new();
        for i in 0..50 {
            table.put(i, i);
        }
        let mut seen: Vec<i32> = table.iter().map(|(k, _)| *k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn put_multi_allows_duplicate_keys_and_find_next_visits_both() {
        let table: RawTable<&str, i32, SingleThreaded> = RawTable::new();
        table.put_multi("k", 1);
        table.put_multi("k", 2);
        assert_eq!(table.len(), 2);

        let hash = table.hash_of("k");
        let mut range = table.find_range(hash);
        let mut values = Vec::new();
        while let Some(i) = table.find_next(&mut range, hash, "k") {
            values.push(unsafe { table.slot(i).entry().1 });
        }
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }
}
