// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! [`ConnectionCache`]: a listening socket that accepts peers, caches them
//! by file descriptor, and hands them back through a FIFO of "ready to
//! read" connections.
//!
//! Grounded on `TCPServerSocket` (`include/tcp_socket.h`): `poll`,
//! `poll_or_accept`, and `accept` mirror `poll`/`pollOrAccept`/`accept`'s
//! listener-or-peer dispatch and `return_connection`/`close_connection`/
//! `detach_connection` the same re-arm/remove bookkeeping; the `ready` FIFO
//! plays the same role as the original's `_ready` deque, buffering any
//! extra connections a single poll cycle found beyond the one a blocking
//! caller consumes. Readiness comes from `mio::{Poll, Events, Token}`
//! rather than raw `poll(2)` over a `pollfd` vector, matching the teacher's
//! `transport/tcp/io_thread.rs`; accepted connections are tracked in
//! `rpl`'s own `table::HashMap` rather than `std::collections::HashMap`,
//! per this module's place in the dependency graph.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::config::TcpConfig;
use crate::deque::Deque;
use crate::error::{Error, Result};
use crate::table::HashMap;

use super::connection::Connection;

const LISTENER_TOKEN: Token = Token(0);

/// A server socket retaining a map of client FDs to connection handles.
pub struct ConnectionCache {
    listener: TcpListener,
    poll: Poll,
    events: Events,
    connections: HashMap<RawFd, Connection>,
    tokens: HashMap<usize, RawFd>,
    ready: Deque<RawFd>,
    next_token: usize,
    config: TcpConfig,
}

impl ConnectionCache {
    pub fn bind(addr: SocketAddr, config: TcpConfig) -> Result<Self> {
        let mut listener = TcpListener::bind(addr).map_err(Error::from)?;
        let poll = Poll::new().map_err(Error::from)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(Error::from)?;
        Ok(Self {
            listener,
            poll,
            events: Events::with_capacity(config.events_capacity),
            connections: HashMap::new(),
            tokens: HashMap::new(),
            ready: Deque::new(),
            next_token: LISTENER_TOKEN.0 + 1,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::from)
    }

    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn connection(&self, fd: RawFd) -> Option<&Connection> {
        self.connections.get(&fd)
    }

    /// Re-arms `fd` for read readiness. Call once the caller is done
    /// draining a connection handed back by `poll`/`accept`.
    pub fn return_connection(&mut self, fd: RawFd) -> Result<()> {
        let conn = self.connections.get(&fd).ok_or(Error::ElementNotFound)?;
        conn.reregister(self.poll.registry(), Interest::READABLE).map_err(Error::from)
    }

    /// Closes and forgets a cached connection.
    pub fn close_connection(&mut self, fd: RawFd) -> Result<()> {
        let conn = self.connections.remove(&fd).ok_or(Error::ElementNotFound)?;
        let _ = self.tokens.remove(&conn.token().0);
        let _ = conn.deregister(self.poll.registry());
        Ok(())
    }

    /// Forgets a cached connection without closing its socket; the caller
    /// takes over its lifetime.
    pub fn detach_connection(&mut self, fd: RawFd) -> Result<Connection> {
        let conn = self.connections.remove(&fd).ok_or(Error::ElementNotFound)?;
        let _ = self.tokens.remove(&conn.token().0);
        let _ = conn.deregister(self.poll.registry());
        Ok(conn)
    }

    /// Polls cached connections for readiness, invoking `f` for each one
    /// that has data. Does not accept new connections; callers combining
    /// accept with poll should use [`ConnectionCache::poll_or_accept`].
    pub fn poll<F: FnMut(RawFd)>(&mut self, f: F, timeout: Duration) -> Result<()> {
        self.drain_ready(f, timeout, false)
    }

    /// Like [`ConnectionCache::poll`], but also accepts new connections off
    /// the listener and reports each one as ready.
    pub fn poll_or_accept<F: FnMut(RawFd)>(&mut self, f: F, timeout: Duration) -> Result<()> {
        self.drain_ready(f, timeout, true)
    }

    /// Blocks until a connection is ready, then returns its FD.
    pub fn accept(&mut self) -> Result<RawFd> {
        let timeout = self.config.poll_timeout;
        loop {
            if self.ready.is_empty() {
                self.collect_ready(timeout, true)?;
            }
            if let Ok(fd) = self.ready.dequeue() {
                return Ok(fd);
            }
        }
    }

    /// If the ready queue is already holding connections from a previous
    /// poll cycle, drains all of them to `f` immediately; otherwise polls
    /// once and drains whatever that cycle finds.
    fn drain_ready<F: FnMut(RawFd)>(&mut self, mut f: F, timeout: Duration, accept_enabled: bool) -> Result<()> {
        if self.ready.is_empty() {
            self.collect_ready(timeout, accept_enabled)?;
        }
        while let Ok(fd) = self.ready.dequeue() {
            f(fd);
        }
        Ok(())
    }

    /// Runs one `mio::Poll::poll` cycle and appends every fd it finds ready
    /// (accepted peers, readable peers, closed peers having been removed)
    /// onto `self.ready`.
    fn collect_ready(&mut self, timeout: Duration, accept_enabled: bool) -> Result<()> {
        self.poll.poll(&mut self.events, Some(timeout)).map_err(Error::from)?;

        let mut readable = Vec::new();
        let mut closed = Vec::new();
        let mut saw_listener = false;
        for event in self.events.iter() {
            if event.token() == LISTENER_TOKEN {
                saw_listener = true;
            } else if event.is_read_closed() || event.is_write_closed() || event.is_error() {
                closed.push(event.token());
            } else if event.is_readable() {
                readable.push(event.token());
            }
        }

        if saw_listener && accept_enabled {
            self.accept_pending()?;
        }

        for token in closed {
            if let Some(&fd) = self.tokens.get(&token.0) {
                let _ = self.close_connection(fd);
            }
        }

        for token in readable {
            if let Some(&fd) = self.tokens.get(&token.0) {
                if let Some(conn) = self.connections.get(&fd) {
                    let _ = conn.deregister(self.poll.registry());
                }
                self.ready.enqueue(fd);
            }
        }

        Ok(())
    }

    fn accept_pending(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    let raw_fd = stream.as_raw_fd();

                    let conn = Connection::new(stream, token, remote_addr);
                    conn.register(self.poll.registry(), Interest::READABLE).map_err(Error::from)?;

                    self.connections.put(raw_fd, conn);
                    self.tokens.put(token.0, raw_fd);
                    self.ready.enqueue(raw_fd);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Closes every cached connection, then the listener itself.
    pub fn close(&mut self) {
        let fds: Vec<RawFd> = self.connections.iter().map(|(fd, _)| *fd).collect();
        for fd in fds {
            let _ = self.close_connection(fd);
        }
        let _ = self.poll.registry().deregister(&mut self.listener);
    }
}

impl Drop for ConnectionCache {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, TcpStream as StdTcpStream};
    use std::time::Duration;

    fn local_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn accept_reports_a_connecting_peer() {
        let mut cache = ConnectionCache::bind(local_addr(0), TcpConfig::default()).unwrap();
        let addr = cache.local_addr().unwrap();

        let _client = StdTcpStream::connect(addr).unwrap();

        let mut seen = None;
        for _ in 0..50 {
            cache
                .poll_or_accept(|fd| seen = Some(fd), Duration::from_millis(20))
                .unwrap();
            if seen.is_some() {
                break;
            }
        }
        assert!(seen.is_some());
        assert_eq!(cache.num_connections(), 1);
    }
}
