// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP connection-cache helpers.
//!
//! [`ConnectionCache`] owns a listening socket plus a table of accepted
//! peers, keyed by file descriptor. Callers drive it with `poll`/
//! `poll_or_accept`/`accept` and get back the FDs that have data, then read
//! or write through the returned [`Connection`] handle.
//!
//! Grounded on `TCPSocket`/`TCPServerSocket` (`include/tcp_socket.h`), with
//! readiness polling translated to `mio::{Poll, Events, Token}` the way the
//! teacher's `transport/tcp/io_thread.rs` does it.

mod cache;
mod connection;

pub use cache::ConnectionCache;
pub use connection::Connection;
