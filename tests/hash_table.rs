// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Integration coverage for `rpl::table` across its four container shapes.

use std::sync::Arc;
use std::thread;

use rpl::table::{ConcurrentHashMap, ConcurrentHashMultiset, HashMap, HashMultiset, HashSet};

#[test]
fn map_replaces_on_collision_and_tracks_len() {
    let map = HashMap::new();
    for i in 0..500 {
        map.put(i, i * 2);
    }
    assert_eq!(map.len(), 500);
    assert_eq!(map.put(10, 999), Some(20));
    assert_eq!(map.get(&10), Some(&999));
    assert_eq!(map.len(), 500);
}

#[test]
fn map_grows_past_initial_capacity_without_losing_entries() {
    let map = HashMap::with_capacity(4);
    for i in 0..10_000 {
        map.put(i, i.to_string());
    }
    assert_eq!(map.len(), 10_000);
    for i in (0..10_000).step_by(137) {
        assert_eq!(map.get(&i), Some(&i.to_string()));
    }
}

#[test]
fn set_dedupes_while_multiset_keeps_occurrences() {
    let set = HashSet::new();
    let multiset = HashMultiset::new();
    for _ in 0..5 {
        set.insert("dup");
        multiset.insert("dup");
    }
    assert_eq!(set.len(), 1);
    assert_eq!(multiset.count("dup"), 5);
}

#[test]
fn concurrent_map_readers_see_writer_progress() {
    let map = Arc::new(ConcurrentHashMap::new());
    let writer = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            for i in 0..2000 {
                map.put(i, i);
            }
        })
    };
    writer.join().unwrap();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let map = Arc::clone(&map);
        readers.push(thread::spawn(move || {
            for i in 0..2000 {
                assert_eq!(map.get(&i), Some(&i));
            }
        }));
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(map.len(), 2000);
}

#[test]
fn concurrent_multiset_counts_inserts_from_every_thread() {
    let ms = Arc::new(ConcurrentHashMultiset::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ms = Arc::clone(&ms);
        handles.push(thread::spawn(move || {
            for _ in 0..250 {
                ms.insert("shared");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(ms.count("shared"), 2000);
}
