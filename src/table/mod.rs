// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Open-addressed hash table core and its map/set containers.
//!
//! [`raw::RawTable`] is the shared probing/growth engine, parameterized by a
//! [`controller::Controller`] policy (`SingleThreaded` or `Concurrent`) the
//! same way `include/core/hash_table.h`'s `HashTable` template is
//! parameterized over a controller type. [`HashMap`]/[`HashSet`] replace an
//! existing entry on a key collision; [`HashMultimap`]/[`HashMultiset`]
//! always insert a new slot, and read back matches by replaying the probe
//! scan rather than chaining occupied slots.
//!
//! Concurrent variants (`ConcurrentHashMap`, `ConcurrentHashMultimap`,
//! `ConcurrentHashSet`, `ConcurrentHashMultiset`) share the exact same
//! generic code, instantiated with `Controller = Concurrent` instead of
//! `SingleThreaded`.

mod controller;
mod map;
mod raw;
mod set;

pub use map::{ConcurrentHashMap, ConcurrentHashMultimap, HashMap, HashMultimap};
pub use set::{ConcurrentHashMultiset, ConcurrentHashSet, HashMultiset, HashSet};
