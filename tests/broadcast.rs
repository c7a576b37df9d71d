// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Integration coverage for `rpl::broadcast` over real loopback sockets,
//! both with and without simulated datagram loss on the data path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use rpl::broadcast::BroadcastSocket;
use rpl::config::BroadcastConfig;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

fn free_port() -> u16 {
    UdpSocket::bind(loopback(0)).unwrap().local_addr().unwrap().port()
}

fn fast_config() -> BroadcastConfig {
    BroadcastConfig {
        timeout: Duration::from_millis(30),
        max_timeouts: 100,
        resend_dedupe_duration: Duration::from_millis(5),
        sequence_update_interval: Duration::from_millis(20),
        congestion_update_interval: Duration::from_millis(20),
        ..BroadcastConfig::default()
    }
}

/// Polls `recv` non-blocking until a message arrives or `deadline` passes.
fn recv_within(socket: &BroadcastSocket, buf: &mut [u8], deadline: Duration) -> (Option<SocketAddr>, usize) {
    let start = Instant::now();
    loop {
        let (from, n) = socket.recv(buf, false);
        if n > 0 {
            return (from, n);
        }
        if start.elapsed() > deadline {
            return (None, 0);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn direct_loopback_round_trip_delivers_a_whole_message() {
    let port_a = free_port();
    let port_b = free_port();
    let addr_a = loopback(port_a);
    let addr_b = loopback(port_b);

    let a = BroadcastSocket::bind(port_a, vec![addr_b], fast_config()).unwrap();
    let b = BroadcastSocket::bind(port_b, vec![addr_a], fast_config()).unwrap();

    a.send(b"hello from a");

    let mut buf = [0u8; 64];
    let (from, n) = recv_within(&b, &mut buf, Duration::from_secs(2));
    assert_eq!(&buf[..n], b"hello from a");
    assert_eq!(from, Some(addr_a));
}

#[test]
fn multi_fragment_message_reassembles_in_order() {
    let port_a = free_port();
    let port_b = free_port();
    let addr_a = loopback(port_a);
    let addr_b = loopback(port_b);

    let mut config = fast_config();
    config.max_datagram_size = 32; // force many small fragments

    let a = BroadcastSocket::bind(port_a, vec![addr_b], config).unwrap();
    let b = BroadcastSocket::bind(port_b, vec![addr_a], config).unwrap();

    let payload: Vec<u8> = (0u8..=255).collect();
    a.send(&payload);

    let mut buf = [0u8; 512];
    let (from, n) = recv_within(&b, &mut buf, Duration::from_secs(3));
    assert_eq!(from, Some(addr_a));
    assert_eq!(&buf[..n], &payload[..]);
}

#[test]
fn messages_survive_a_lossy_relay_via_retransmission() {
    let port_a = free_port();
    let port_b = free_port();
    let port_relay = free_port();
    let addr_a = loopback(port_a);
    let addr_b = loopback(port_b);
    let addr_relay = loopback(port_relay);

    // A and B both "broadcast" to the relay's address rather than to each
    // other directly; the relay forwards A's datagrams to B, dropping a
    // fraction of them, and forwards B's feedback (RESEND/UNAVAILABLE/
    // SEQUENCE_UPDATE) back to A without loss, so the loss is one-directional
    // on the data path and retransmission is what recovers it.
    let relay_socket = UdpSocket::bind(addr_relay).unwrap();
    relay_socket.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    let relay_handle = std::thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let (n, src) = match relay_socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if src == addr_a {
                if fastrand::f32() < 0.3 {
                    continue; // simulated loss
                }
                let _ = relay_socket.send_to(&buf[..n], addr_b);
            } else if src == addr_b {
                let _ = relay_socket.send_to(&buf[..n], addr_a);
            }
        }
    });

    let a = BroadcastSocket::bind(port_a, vec![addr_relay], fast_config()).unwrap();
    let b = BroadcastSocket::bind(port_b, vec![addr_relay], fast_config()).unwrap();

    for i in 0..10 {
        a.send(format!("message {i}").as_bytes());
    }

    let mut received = Vec::new();
    let mut buf = [0u8; 64];
    for _ in 0..10 {
        let (_from, n) = recv_within(&b, &mut buf, Duration::from_secs(5));
        assert!(n > 0, "message was not recovered despite retransmission");
        received.push(String::from_utf8(buf[..n].to_vec()).unwrap());
    }

    for i in 0..10 {
        assert!(received.contains(&format!("message {i}")));
    }

    relay_handle.join().unwrap();
}
