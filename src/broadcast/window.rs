// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The sliding window both the sender and each receive [`super::stream::Stream`]
//! use to retain fragments by sequence number, keyed modulo the window size.
//!
//! Grounded on `UDPBroadcastSocket::Window` in `src/udp_broadcast_socket.cpp`.
//! A `FragmentPack` holds several fragments, so several window slots end up
//! pointing at the same pack; `Arc` reference counting (shared, since packs
//! cross from the receiver thread to the public API caller via the recv
//! queue) replaces the original's manual "walk neighbors sharing this
//! pointer, then delete" bookkeeping.

use std::sync::Arc;

use super::wire::{Fragment, FragmentPack};

struct Slot {
    fragment: Fragment,
    pack: Arc<FragmentPack>,
}

/// A fixed-size ring of fragment slots, indexed by `seq % size()`.
pub(crate) struct Window {
    slots: Vec<Option<Slot>>,
}

impl Window {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| None).collect(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, seq: u32) -> usize {
        (seq as usize) % self.slots.len()
    }

    /// Inserts every fragment in `pack` into its slot. If `overwrite` is
    /// false, a fragment whose slot is already occupied is skipped (the
    /// pack is still retained as long as at least one fragment landed).
    /// Returns whether anything was inserted.
    pub(crate) fn insert(&mut self, pack: Arc<FragmentPack>, overwrite: bool) -> bool {
        let mut inserted = false;
        for fragment in pack.fragments() {
            let i = self.index(fragment.seq());
            if self.slots[i].is_some() && overwrite {
                self.slots[i] = None;
            }
            if self.slots[i].is_none() {
                self.slots[i] = Some(Slot {
                    fragment,
                    pack: pack.clone(),
                });
                inserted = true;
            }
        }
        inserted
    }

    pub(crate) fn get(&self, seq: u32) -> Option<Fragment> {
        let i = self.index(seq);
        self.slots[i].as_ref().and_then(|slot| {
            if slot.fragment.seq() == seq {
                Some(slot.fragment)
            } else {
                None
            }
        })
    }

    pub(crate) fn get_pack(&self, seq: u32) -> Option<&Arc<FragmentPack>> {
        let i = self.index(seq);
        self.slots[i].as_ref().map(|slot| &slot.pack)
    }

    /// Clears every slot in `[start, end)`, then continues clearing forward
    /// past `end` while the slot still belongs to the same pack as the one
    /// at `end - 1` — packs that straddle the boundary are fully evicted.
    pub(crate) fn extract(&mut self, start: u32, end: u32) {
        if start == end {
            return;
        }
        let size = self.slots.len();
        let mut last: Option<Arc<FragmentPack>> = None;
        let mut seq = start;
        while seq != end {
            let i = self.index(seq);
            if let Some(slot) = &self.slots[i] {
                if last.as_ref().map(|p| !Arc::ptr_eq(p, &slot.pack)).unwrap_or(true) {
                    last = Some(slot.pack.clone());
                }
            }
            self.slots[i] = None;
            seq = seq.wrapping_add(1);
        }
        if let Some(last_pack) = last {
            let mut i = self.index(seq);
            loop {
                match &self.slots[i] {
                    Some(slot) if Arc::ptr_eq(&slot.pack, &last_pack) => {
                        self.slots[i] = None;
                        i = (i + 1) % size;
                    }
                    _ => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::wire::{FragmentKind, Header};

    fn data_pack(seq: u32, body: &[u8]) -> Arc<FragmentPack> {
        let mut pack = FragmentPack::new(64);
        pack.push(Header::control(FragmentKind::Data(body.len() as u16), seq), Some(body));
        Arc::new(pack)
    }

    #[test]
    fn insert_then_get_round_trips_by_sequence() {
        let mut window = Window::new(8);
        assert!(window.insert(data_pack(3, b"abc"), false));
        let f = window.get(3).unwrap();
        assert_eq!(f.seq(), 3);
    }

    #[test]
    fn get_returns_none_for_stale_slot_occupant() {
        let mut window = Window::new(4);
        window.insert(data_pack(1, b"x"), false);
        // seq 5 aliases seq 1's slot (5 % 4 == 1) but hasn't been inserted.
        assert!(window.get(5).is_none());
    }

    #[test]
    fn no_overwrite_skips_occupied_slot() {
        let mut window = Window::new(8);
        assert!(window.insert(data_pack(2, b"first"), false));
        assert!(!window.insert(data_pack(2, b"second"), false));
        assert_eq!(window.get(2).unwrap().seq(), 2);
    }

    #[test]
    fn extract_clears_range() {
        let mut window = Window::new(8);
        window.insert(data_pack(0, b"a"), false);
        window.insert(data_pack(1, b"b"), false);
        window.extract(0, 2);
        assert!(window.get(0).is_none());
        assert!(window.get(1).is_none());
    }
}
