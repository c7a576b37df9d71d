// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire framing: fragment headers, fragment packs (one UDP datagram's worth
//! of fragments), and the sequence-wraparound comparator.
//!
//! Grounded on `UDPBroadcastSocket::Header`/`Fragment`/`FragmentPack` in
//! `src/udp_broadcast_socket.cpp`. The six sentinel `len` values the C++
//! source compares against directly (`INVALID`, `START_OF_MSG`, ...) are
//! exposed here as [`FragmentKind`], a tagged enum derived from the header's
//! raw `len` field rather than scattered magic-number comparisons.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::Instant;

/// Size in bytes of a [`Header`] on the wire: `len: u16` + `seq: u32`.
pub const HEADER_SIZE: usize = 6;

const INVALID: u16 = u16::MAX;
const START_OF_MSG: u16 = u16::MAX - 1;
const END_OF_MSG: u16 = u16::MAX - 2;
const RESEND: u16 = u16::MAX - 3;
const UNAVAILABLE: u16 = u16::MAX - 4;
const SEQUENCE_UPDATE: u16 = u16::MAX - 5;
/// Anything at or below this is a real body length, not a sentinel.
const NORMAL_MAX: u16 = u16::MAX - 6;

/// The kind of a fragment, decoded from its header's `len` field. `Data`
/// carries the fragment's body length. Mirrors `Fragment::type()`'s
/// comparisons against the sentinel constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentKind {
    Data(u16),
    StartOfMsg,
    EndOfMsg,
    Resend,
    Unavailable,
    SequenceUpdate,
    Invalid,
}

impl FragmentKind {
    fn from_raw(len: u16) -> Self {
        match len {
            INVALID => FragmentKind::Invalid,
            START_OF_MSG => FragmentKind::StartOfMsg,
            END_OF_MSG => FragmentKind::EndOfMsg,
            RESEND => FragmentKind::Resend,
            UNAVAILABLE => FragmentKind::Unavailable,
            SEQUENCE_UPDATE => FragmentKind::SequenceUpdate,
            n if n <= NORMAL_MAX => FragmentKind::Data(n),
            _ => FragmentKind::Invalid,
        }
    }

    fn raw(self) -> u16 {
        match self {
            FragmentKind::Data(n) => n,
            FragmentKind::StartOfMsg => START_OF_MSG,
            FragmentKind::EndOfMsg => END_OF_MSG,
            FragmentKind::Resend => RESEND,
            FragmentKind::Unavailable => UNAVAILABLE,
            FragmentKind::SequenceUpdate => SEQUENCE_UPDATE,
            FragmentKind::Invalid => INVALID,
        }
    }

    pub(crate) fn is_data_bearing(self) -> bool {
        matches!(self, FragmentKind::Data(_))
    }
}

/// A fragment's fixed-size header: its kind (packed into `len`) and
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub kind: FragmentKind,
    pub seq: u32,
}

impl Header {
    pub(crate) fn control(kind: FragmentKind, seq: u32) -> Self {
        Self { kind, seq }
    }

    fn write_to(self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.kind.raw().to_le_bytes());
        out[2..6].copy_from_slice(&self.seq.to_le_bytes());
    }

    fn read_from(data: &[u8]) -> Self {
        let len = u16::from_le_bytes([data[0], data[1]]);
        let seq = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        Self {
            kind: FragmentKind::from_raw(len),
            seq,
        }
    }
}

/// A single fragment parsed out of a [`FragmentPack`]: a header plus the
/// byte range of its body within the pack's buffer (empty for control
/// fragments).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    pub header: Header,
    body_offset: usize,
    body_len: usize,
}

impl Fragment {
    pub(crate) fn kind(&self) -> FragmentKind {
        self.header.kind
    }

    pub(crate) fn seq(&self) -> u32 {
        self.header.seq
    }

    fn total_size(&self) -> usize {
        HEADER_SIZE + if self.kind().is_data_bearing() { self.body_len } else { 0 }
    }
}

/// Picks whichever of `a`/`b` is closer going forward modulo 2^32. All
/// sequence ordering in `broadcast` goes through this rather than raw `<`,
/// since sequence numbers wrap.
pub(crate) fn seq_max(a: u32, b: u32) -> u32 {
    if a <= b {
        if a.wrapping_sub(b) <= b.wrapping_sub(a) {
            a
        } else {
            b
        }
    } else if a.wrapping_sub(b) < b.wrapping_sub(a) {
        a
    } else {
        b
    }
}

/// One UDP datagram's worth of fragments: a growable write cursor used when
/// assembling a pack to send, and a read cursor used when popping fragments
/// back out (either while parsing a received datagram, or while re-walking
/// a previously sent one for retransmission bookkeeping).
///
/// Mirrors `UDPBroadcastSocket::FragmentPack`. The resend-dedup timestamp
/// (`nextSend` in the original) is behind a `Mutex` rather than a `Cell`
/// since packs are shared via `Arc` and cross from the receiver thread to
/// the public API caller through the recv queue, which requires `Sync`.
pub(crate) struct FragmentPack {
    capacity: usize,
    buf: Vec<u8>,
    next_send: Mutex<Option<Instant>>,
}

impl FragmentPack {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Vec::with_capacity(capacity),
            next_send: Mutex::new(None),
        }
    }

    /// Whether this pack may be resent now, given the dedupe `window`. If
    /// so, marks the next eligible resend time as `now + window`.
    pub(crate) fn try_mark_resend(&self, now: Instant, window: std::time::Duration) -> bool {
        let mut next_send = self.next_send.lock().unwrap();
        let eligible = next_send.map(|deadline| now > deadline).unwrap_or(true);
        if eligible {
            *next_send = Some(now + window);
        }
        eligible
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn size(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Appends a fragment if it fits within the datagram capacity.
    pub(crate) fn push(&mut self, header: Header, body: Option<&[u8]>) -> bool {
        let body_len = body.map_or(0, <[u8]>::len);
        let total = HEADER_SIZE + if header.kind.is_data_bearing() { body_len } else { 0 };
        if total > self.remaining() {
            return false;
        }
        let mut tmp = [0u8; HEADER_SIZE];
        header.write_to(&mut tmp);
        self.buf.extend_from_slice(&tmp);
        if header.kind.is_data_bearing() {
            self.buf.extend_from_slice(body.unwrap());
        }
        true
    }

    /// Parses every fragment currently in the buffer, in order. Does not
    /// consume a read cursor: packs are read-only once shared, so parsing
    /// replays from byte 0 every time.
    pub(crate) fn fragments(&self) -> Vec<Fragment> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset < self.buf.len() {
            let header = Header::read_from(&self.buf[offset..offset + HEADER_SIZE]);
            let body_len = if header.kind.is_data_bearing() {
                match header.kind {
                    FragmentKind::Data(n) => n as usize,
                    _ => unreachable!(),
                }
            } else {
                0
            };
            let fragment = Fragment {
                header,
                body_offset: offset + HEADER_SIZE,
                body_len,
            };
            offset += fragment.total_size();
            out.push(fragment);
        }
        out
    }

    pub(crate) fn first(&self) -> Option<Fragment> {
        if self.buf.is_empty() {
            return None;
        }
        let header = Header::read_from(&self.buf[..HEADER_SIZE]);
        let body_len = match header.kind {
            FragmentKind::Data(n) => n as usize,
            _ => 0,
        };
        Some(Fragment {
            header,
            body_offset: HEADER_SIZE,
            body_len,
        })
    }

    pub(crate) fn body(&self, fragment: &Fragment) -> &[u8] {
        &self.buf[fragment.body_offset..fragment.body_offset + fragment.body_len]
    }

    pub(crate) fn send_to(&self, socket: &UdpSocket, addrs: &[SocketAddr]) -> io::Result<()> {
        for addr in addrs {
            loop {
                match socket.send_to(&self.buf, addr) {
                    Ok(n) if n == self.buf.len() => break,
                    Ok(_) => break,
                    Err(e)
                        if e.kind() == io::ErrorKind::WouldBlock
                            || e.kind() == io::ErrorKind::Interrupted =>
                    {
                        std::thread::yield_now();
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    pub(crate) fn recv_from(&mut self, socket: &UdpSocket) -> io::Result<SocketAddr> {
        self.buf.resize(self.capacity, 0);
        let (n, addr) = socket.recv_from(&mut self.buf)?;
        self.buf.truncate(n);
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_max_handles_wraparound() {
        assert_eq!(seq_max(5, 10), 10);
        assert_eq!(seq_max(10, 5), 10);
        assert_eq!(seq_max(u32::MAX, 0), 0);
        assert_eq!(seq_max(0, u32::MAX), 0);
    }

    #[test]
    fn push_and_parse_round_trip_data_fragment() {
        let mut pack = FragmentPack::new(64);
        let header = Header::control(FragmentKind::Data(3), 42);
        assert!(pack.push(header, Some(&[1, 2, 3])));
        let fragments = pack.fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].seq(), 42);
        assert_eq!(pack.body(&fragments[0]), &[1, 2, 3]);
    }

    #[test]
    fn push_fails_when_datagram_is_full() {
        let mut pack = FragmentPack::new(HEADER_SIZE + 2);
        assert!(pack.push(Header::control(FragmentKind::Data(2), 0), Some(&[1, 2])));
        assert!(!pack.push(Header::control(FragmentKind::Data(1), 1), Some(&[1])));
    }

    #[test]
    fn control_fragments_carry_no_body() {
        let mut pack = FragmentPack::new(64);
        assert!(pack.push(Header::control(FragmentKind::EndOfMsg, 7), None));
        let f = pack.first().unwrap();
        assert_eq!(f.kind(), FragmentKind::EndOfMsg);
        assert_eq!(pack.body(&f), &[] as &[u8]);
    }
}
