// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::cast_possible_truncation)]

//! Loopback throughput benchmark for `rpl::broadcast`: one sender pushing
//! fixed-size messages to one receiver over real UDP sockets.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rpl::broadcast::BroadcastSocket;
use rpl::config::BroadcastConfig;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

fn free_port() -> u16 {
    UdpSocket::bind(loopback(0)).unwrap().local_addr().unwrap().port()
}

fn bench_message_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_loopback_throughput");
    for size in [64usize, 512, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let port_a = free_port();
            let port_b = free_port();
            let a = BroadcastSocket::bind(port_a, vec![loopback(port_b)], BroadcastConfig::default()).unwrap();
            let recv_socket = BroadcastSocket::bind(port_b, vec![loopback(port_a)], BroadcastConfig::default()).unwrap();
            let payload = vec![0xABu8; size];
            let mut buf = vec![0u8; size];

            b.iter(|| {
                a.send(&payload);
                let mut total = 0;
                while total < size {
                    let (_, n) = recv_socket.recv(&mut buf[total..], true);
                    total += n;
                }
                total
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_message_throughput
}
criterion_main!(benches);
