// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable, ordered, message-oriented broadcast over UDP.
//!
//! [`BroadcastSocket`] fragments outgoing messages, frames each datagram
//! with a sequence number, and retransmits anything a receiver reports
//! missing. Delivery is ordered and reliable per sender but is broadcast
//! fan-out, not point-to-point: there is no connection handshake, and a
//! slow or dead receiver cannot block the sender beyond its resend window.
//!
//! Grounded on `UDPBroadcastSocket` (`include/udp_broadcast_socket.h`,
//! `src/udp_broadcast_socket.cpp`). Internal layering:
//! - [`wire`] — fragment header encoding and the sequence comparator
//! - [`window`] — the sliding window of retained fragments
//! - [`congestion`] — send pacing derived from the resend ratio
//! - [`stream`] — per-sender reassembly and feedback
//! - [`socket`] — the public socket, its sender and receiver threads

mod congestion;
mod socket;
mod stream;
mod window;
mod wire;

pub use congestion::CongestionMetrics;
pub use socket::BroadcastSocket;
