// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide configuration structs.
//!
//! Plain `Default`-able structs rather than the teacher's `RuntimeConfig`
//! (`ArcSwap`/`DashMap`-backed, built for hot-swappable QoS trees): `rpl`'s
//! knobs are fixed at construction time, so there is no runtime mutation to
//! make lock-free. With the `config-files` feature enabled, each config
//! derives `serde::Deserialize` so it can be loaded from a YAML file via
//! `serde_yaml`, matching how the teacher's CLI crates load their own
//! deployment configs.

use std::time::Duration;

#[cfg(feature = "config-files")]
use serde::Deserialize;

/// Tuning for [`crate::broadcast::BroadcastSocket`]. Field defaults mirror
/// `UDPBroadcastSocket`'s member initializers in `udp_broadcast_socket.h`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config-files", derive(Deserialize))]
pub struct BroadcastConfig {
    /// Largest UDP payload a single fragment pack will fill.
    pub max_datagram_size: usize,
    /// Sender-side window size, in fragment slots.
    pub send_window_size: usize,
    /// Per-sender receive window size, in fragment slots.
    pub recv_window_size: usize,
    /// How long a stream may go without progress before it is considered
    /// timed out.
    pub timeout: Duration,
    /// Consecutive timeouts tolerated before a stream's timeout counter
    /// resets and tracking restarts.
    pub max_timeouts: u32,
    /// Minimum spacing between two retransmissions of the same pack.
    pub resend_dedupe_duration: Duration,
    /// Interval between periodic SEQUENCE_UPDATE fragments.
    pub sequence_update_interval: Duration,
    /// Interval between congestion control recalculations.
    pub congestion_update_interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_datagram_size: 508,
            send_window_size: 256 * 1024,
            recv_window_size: 256 * 1024,
            timeout: Duration::from_millis(100),
            max_timeouts: 10,
            resend_dedupe_duration: Duration::from_millis(5),
            sequence_update_interval: Duration::from_millis(50),
            congestion_update_interval: Duration::from_millis(50),
        }
    }
}

/// Tuning for [`crate::tcp::ConnectionCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(Deserialize))]
pub struct TcpConfig {
    /// Capacity hint for the `mio::Events` buffer used per poll.
    pub events_capacity: usize,
    /// Poll timeout when no explicit deadline is supplied to a blocking
    /// call.
    pub poll_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            events_capacity: 1024,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// Tuning for the [`crate::ser`] stream serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(Deserialize))]
pub struct SerializerConfig {
    /// Initial buffer capacity for a stream serializer.
    pub buffer_capacity: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self { buffer_capacity: 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_defaults_match_the_original_constants() {
        let c = BroadcastConfig::default();
        assert_eq!(c.max_datagram_size, 508);
        assert_eq!(c.max_timeouts, 10);
    }
}
