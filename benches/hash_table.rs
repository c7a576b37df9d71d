// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unreadable_literal)]

//! Throughput benchmarks for `rpl::table`'s single-threaded and concurrent
//! hash maps.

use std::hint::black_box as bb;
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rpl::table::{ConcurrentHashMap, HashMap};

fn bench_single_threaded_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_map_put");
    for size in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let map = HashMap::new();
                for i in 0..size {
                    map.put(bb(i), bb(i));
                }
                bb(map.len())
            });
        });
    }
    group.finish();
}

fn bench_single_threaded_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_map_get");
    for size in [1_000, 10_000, 100_000] {
        let map = HashMap::new();
        for i in 0..size {
            map.put(i, i);
        }
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    bb(map.get(&i));
                }
            });
        });
    }
    group.finish();
}

fn bench_concurrent_put_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_hash_map_put_by_thread_count");
    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let map = Arc::new(ConcurrentHashMap::new());
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let map = Arc::clone(&map);
                        thread::spawn(move || {
                            for i in 0..10_000 {
                                map.put(t * 10_000 + i, i);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                bb(map.len())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_threaded_put,
    bench_single_threaded_get,
    bench_concurrent_put_scaling
);
criterion_main!(benches);
