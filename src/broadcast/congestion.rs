// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-fragment pacing delay, adjusted once per congestion update interval
//! from the sender's (sendCount, resendCount) tally.
//!
//! Grounded on the `updateCongestion` lambda in
//! `UDPBroadcastSocket::_sender` (`src/udp_broadcast_socket.cpp`): a coarse
//! multiplicative/halving heuristic rather than a full RTT-based controller
//! like `tox-sequenced`'s `congestion::Aimd`, whose `Clone + Debug` metrics
//! snapshot style (not its control law) this module's [`CongestionMetrics`]
//! follows.

use std::time::Duration;

const MIN_SLEEP_MICROS: u64 = 30;
const CLEAR_BELOW_MICROS: u64 = 10;

/// Tracks send/resend counts over the current update interval and derives
/// the per-fragment pacing sleep from them.
pub(crate) struct CongestionController {
    sleep_micros: u64,
    send_count: u32,
    resend_count: u32,
}

impl CongestionController {
    pub(crate) fn new() -> Self {
        Self {
            sleep_micros: 0,
            send_count: 0,
            resend_count: 0,
        }
    }

    pub(crate) fn record_send(&mut self) {
        self.send_count += 1;
    }

    pub(crate) fn record_resend(&mut self) {
        self.resend_count += 1;
    }

    /// Returns the sleep a sender should apply before every tenth fragment.
    pub(crate) fn pacing_delay(&self) -> Duration {
        Duration::from_micros(self.sleep_micros)
    }

    /// Adjusts the pacing delay from the tally observed since the last
    /// update, then resets the tally. Matches `updateCongestion`: ramp
    /// gently (x1.05) when most sends still land, ramp hard (x1.5) when
    /// resends dominate, halve down to zero when nothing was resent.
    pub(crate) fn update(&mut self) -> CongestionMetrics {
        if self.resend_count > 0 {
            if self.send_count > self.resend_count {
                self.sleep_micros = if self.sleep_micros == 0 {
                    MIN_SLEEP_MICROS
                } else {
                    (self.sleep_micros as f64 * 1.05) as u64
                };
            } else if self.send_count > 0 {
                self.sleep_micros = if self.sleep_micros == 0 {
                    MIN_SLEEP_MICROS
                } else {
                    (self.sleep_micros as f64 * 1.5) as u64
                };
            }
        } else {
            self.sleep_micros = if self.sleep_micros <= CLEAR_BELOW_MICROS {
                0
            } else {
                self.sleep_micros / 2
            };
        }

        let metrics = CongestionMetrics {
            send_count: self.send_count,
            resend_count: self.resend_count,
            pacing_delay: self.pacing_delay(),
        };
        self.send_count = 0;
        self.resend_count = 0;
        metrics
    }
}

/// A read-only snapshot of the sender's congestion state, sampled once per
/// update interval. Not part of the wire protocol; purely observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionMetrics {
    /// Fragments sent since the previous update.
    pub send_count: u32,
    /// Fragments resent since the previous update.
    pub resend_count: u32,
    /// The pacing delay applied to every tenth fragment, after this update.
    pub pacing_delay: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_sends_clear_congestion_to_zero() {
        let mut c = CongestionController::new();
        for _ in 0..20 {
            c.record_send();
        }
        let m = c.update();
        assert_eq!(m.pacing_delay, Duration::ZERO);
    }

    #[test]
    fn resends_dominating_ramps_up_sharply() {
        let mut c = CongestionController::new();
        c.record_send();
        c.record_resend();
        c.record_resend();
        let m1 = c.update();
        assert!(m1.pacing_delay.as_micros() > 0);

        c.record_send();
        c.record_resend();
        c.record_resend();
        let m2 = c.update();
        assert!(m2.pacing_delay >= m1.pacing_delay);
    }

    #[test]
    fn mostly_successful_sends_ramp_gently() {
        let mut c = CongestionController::new();
        for _ in 0..9 {
            c.record_send();
        }
        c.record_resend();
        let m1 = c.update();
        for _ in 0..9 {
            c.record_send();
        }
        c.record_resend();
        let m2 = c.update();
        assert!(m2.pacing_delay >= m1.pacing_delay);
    }
}
