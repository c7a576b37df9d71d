// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// The span of slot indices that must be probed for a given hash, wrapping
/// at the table boundary.
///
/// Mirrors `__HashTable::HashRange` in `include/core/hash_table.h`.
#[derive(Clone, Copy)]
pub(crate) struct HashRange {
    pub pos: usize,
    pub end: usize,
    pub size: usize,
}

impl HashRange {
    pub fn non_empty(&self) -> bool {
        self.pos != self.end
    }

    pub fn advance(&mut self) {
        self.pos = (self.pos + 1) % self.size;
    }
}

/// Per-slot occupancy tag operations, split out from [`Controller`] because
/// single-threaded and concurrent tables need different storage for the same
/// three-state tag (`UNOCCUPIED` / `TENTATIVELY_OCCUPIED` / `OCCUPIED`).
pub(crate) trait Tag: Default {
    /// Atomically (or trivially) claims the slot if unoccupied, moving it to
    /// `TENTATIVELY_OCCUPIED`. Returns whether the claim succeeded.
    fn occupy_if_free(&self) -> bool;
    /// Marks a tentatively-occupied slot as fully `OCCUPIED` once its payload
    /// has been written.
    fn mark_occupied(&self);
    /// Releases an occupied slot back to `UNOCCUPIED`, passing through
    /// `TENTATIVELY_OCCUPIED` so concurrent readers never observe a torn
    /// drop of the payload as `OCCUPIED`.
    fn release(&self);
    fn occupied(&self) -> bool;
}

const UNOCCUPIED: u8 = 0;
const TENTATIVELY_OCCUPIED: u8 = 1;
const OCCUPIED: u8 = 2;

#[derive(Default)]
pub(crate) struct PlainTag(Cell<u8>);

impl Tag for PlainTag {
    fn occupy_if_free(&self) -> bool {
        if self.0.get() == UNOCCUPIED {
            self.0.set(TENTATIVELY_OCCUPIED);
            true
        } else {
            false
        }
    }

    fn mark_occupied(&self) {
        self.0.set(OCCUPIED);
    }

    fn release(&self) {
        self.0.set(TENTATIVELY_OCCUPIED);
        self.0.set(UNOCCUPIED);
    }

    fn occupied(&self) -> bool {
        self.0.get() == OCCUPIED
    }
}

#[derive(Default)]
pub(crate) struct AtomicTag(AtomicU8);

impl Tag for AtomicTag {
    fn occupy_if_free(&self) -> bool {
        self.0
            .compare_exchange(
                UNOCCUPIED,
                TENTATIVELY_OCCUPIED,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn mark_occupied(&self) {
        self.0.store(OCCUPIED, Ordering::Release);
    }

    fn release(&self) {
        self.0.store(TENTATIVELY_OCCUPIED, Ordering::Release);
        self.0.store(UNOCCUPIED, Ordering::Release);
    }

    fn occupied(&self) -> bool {
        self.0.load(Ordering::Acquire) == OCCUPIED
    }
}

/// Table geometry and concurrency policy, parameterizing [`RawTable`] over
/// single-threaded and concurrent behavior the way
/// `__HashTable::HashTableController` /
/// `__HashTable::ConcurrentHashTableController` parameterize the C++
/// `HashTable` template.
pub(crate) trait Controller: Default {
    type Tag: Tag;

    const BUCKET_SEARCH: usize = 16;
    const INITIAL_BUCKET_SIZE: usize = 1;
    const LINEAR_INCREMENT_THRESHOLD: usize = 100_000_000;

    fn bucket_size(&self) -> usize;
    fn set_bucket_size(&self, v: usize);
    fn n_buckets(&self) -> usize;
    fn set_n_buckets(&self, v: usize);
    fn table_size(&self) -> usize;
    fn set_table_size(&self, v: usize);

    /// Registers a resident reader. No-op for [`SingleThreaded`]; for
    /// [`Concurrent`], spins while a writer holds the table and then
    /// registers as resident so a subsequent `lock()` will wait for this
    /// reader to `exit()`.
    fn enter(&self) {}
    fn exit(&self) {}
    /// Acquires exclusive access for a resize/rehash, waiting for resident
    /// readers to drain. No-op for [`SingleThreaded`].
    fn lock(&self) {}
    fn unlock(&self) {}

    fn init(&self, initial_size: usize) {
        self.set_bucket_size(Self::INITIAL_BUCKET_SIZE);
        let n_buckets = (initial_size / Self::INITIAL_BUCKET_SIZE).max(1);
        self.set_n_buckets(n_buckets);
        self.set_table_size(n_buckets * Self::INITIAL_BUCKET_SIZE);
    }

    fn hash_range(&self, hash: u64) -> HashRange {
        let bucket_size = self.bucket_size();
        let n_buckets = self.n_buckets();
        let table_size = self.table_size();
        let i = (hash as usize % n_buckets) * bucket_size;
        let j = (i + Self::BUCKET_SEARCH * bucket_size) % table_size;
        HashRange {
            pos: i,
            end: j,
            size: table_size,
        }
    }

    fn needs_expand_bucket(&self, hash_collisions_in_range: usize) -> bool {
        hash_collisions_in_range > self.bucket_size()
    }

    /// Grows the bucket size to accommodate `hash_collisions`, then shrinks
    /// `n_buckets` as far as possible without shrinking `table_size`.
    /// Returns 0 (no-op) if `snapshot` no longer matches the live bucket
    /// size, meaning another thread already performed this growth.
    fn increase_bucket_size(&self, snapshot: usize, hash_collisions: usize) -> usize {
        if self.bucket_size() != snapshot {
            return 0;
        }
        let mut bucket_size = self.bucket_size();
        loop {
            bucket_size = if bucket_size < Self::LINEAR_INCREMENT_THRESHOLD {
                bucket_size * 2
            } else {
                bucket_size + Self::LINEAR_INCREMENT_THRESHOLD
            };
            if bucket_size >= hash_collisions {
                break;
            }
        }
        self.set_bucket_size(bucket_size);

        let mut new_n_buckets = self.n_buckets();
        while new_n_buckets * bucket_size > self.table_size() {
            self.set_n_buckets(new_n_buckets);
            new_n_buckets = if new_n_buckets / 2 < Self::LINEAR_INCREMENT_THRESHOLD {
                new_n_buckets / 2
            } else {
                new_n_buckets - Self::LINEAR_INCREMENT_THRESHOLD
            };
        }

        let old_table_size = self.table_size();
        self.set_table_size(self.n_buckets() * bucket_size);
        old_table_size
    }

    /// Doubles (or linearly grows past the threshold) `n_buckets`. Returns 0
    /// if `snapshot` no longer matches the live value.
    fn increase_number_of_buckets(&self, snapshot: usize) -> usize {
        if self.n_buckets() != snapshot {
            return 0;
        }
        let n_buckets = self.n_buckets();
        let new_n_buckets = if n_buckets < Self::LINEAR_INCREMENT_THRESHOLD {
            n_buckets * 2
        } else {
            n_buckets + Self::LINEAR_INCREMENT_THRESHOLD
        };
        self.set_n_buckets(new_n_buckets);
        let old_table_size = self.table_size();
        self.set_table_size(new_n_buckets * self.bucket_size());
        old_table_size
    }
}

/// Single-writer policy: no synchronization, plain `Cell` geometry.
#[derive(Default)]
pub(crate) struct SingleThreaded {
    bucket_size: Cell<usize>,
    n_buckets: Cell<usize>,
    table_size: Cell<usize>,
}

impl Controller for SingleThreaded {
    type Tag = PlainTag;

    fn bucket_size(&self) -> usize {
        self.bucket_size.get()
    }
    fn set_bucket_size(&self, v: usize) {
        self.bucket_size.set(v)
    }
    fn n_buckets(&self) -> usize {
        self.n_buckets.get()
    }
    fn set_n_buckets(&self, v: usize) {
        self.n_buckets.set(v)
    }
    fn table_size(&self) -> usize {
        self.table_size.get()
    }
    fn set_table_size(&self, v: usize) {
        self.table_size.set(v)
    }
}

/// Thread-safe policy: atomics for geometry, a `resident`-count reader
/// registry plus a `hold` flag and a spinlock for exclusive resize access.
/// Mirrors `ConcurrentHashTableController`'s `_mtx`/`_hold`/`_resident`.
#[derive(Default)]
pub(crate) struct Concurrent {
    bucket_size: AtomicUsize,
    n_buckets: AtomicUsize,
    table_size: AtomicUsize,
    locked: AtomicBool,
    hold: AtomicBool,
    resident: AtomicUsize,
}

impl Controller for Concurrent {
    type Tag = AtomicTag;

    fn bucket_size(&self) -> usize {
        self.bucket_size.load(Ordering::Relaxed)
    }
    fn set_bucket_size(&self, v: usize) {
        self.bucket_size.store(v, Ordering::Relaxed)
    }
    fn n_buckets(&self) -> usize {
        self.n_buckets.load(Ordering::Relaxed)
    }
    fn set_n_buckets(&self, v: usize) {
        self.n_buckets.store(v, Ordering::Relaxed)
    }
    fn table_size(&self) -> usize {
        self.table_size.load(Ordering::Relaxed)
    }
    fn set_table_size(&self, v: usize) {
        self.table_size.store(v, Ordering::Relaxed)
    }

    fn enter(&self) {
        while self.hold.load(Ordering::Relaxed) {
            std::thread::yield_now();
        }
        self.resident.fetch_add(1, Ordering::AcqRel);
    }

    fn exit(&self) {
        self.resident.fetch_sub(1, Ordering::AcqRel);
    }

    fn lock(&self) {
        self.resident.fetch_sub(1, Ordering::AcqRel);
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::thread::yield_now();
        }
        self.hold.store(true, Ordering::Release);
        while self.resident.load(Ordering::Acquire) > 0 {
            std::thread::yield_now();
        }
    }

    fn unlock(&self) {
        self.resident.fetch_add(1, Ordering::AcqRel);
        self.hold.store(false, Ordering::Release);
        self.locked.store(false, Ordering::Release);
    }
}
