// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Every fallible operation in `rpl` returns [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. `Error` is a flat enum rather than a
//! per-module error hierarchy so that callers crossing module boundaries
//! (e.g. a broadcast socket failure surfacing through a deque dequeue) do
//! not have to thread conversions by hand.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by `rpl`'s containers, serializer, and transports.
///
/// # Example
///
/// ```
/// use rpl::{Error, Result};
///
/// fn lookup(found: bool) -> Result<u32> {
///     if found { Ok(42) } else { Err(Error::ElementNotFound) }
/// }
///
/// match lookup(false) {
///     Err(Error::ElementNotFound) => println!("not found"),
///     Err(e) => println!("other error: {}", e),
///     Ok(v) => println!("found {}", v),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Container errors
    // ========================================================================
    /// `get`/`remove`/`removeNode` on a key that is not present.
    ElementNotFound,
    /// Seek, positional read/write, or insert-after-end iterator misuse.
    OutOfRange,

    // ========================================================================
    // Timeout errors
    // ========================================================================
    /// A semaphore wait or operation-level deadline expired.
    TimeoutError,
    /// Specialization of `TimeoutError` for deque consumers.
    DequeueTimedout,

    // ========================================================================
    // Transport / connection errors
    // ========================================================================
    /// A TCP connect attempt exceeded its deadline.
    ConnectionTimedOut,
    /// The remote end refused the connection.
    ConnectionRefused,
    /// The destination network is unreachable.
    NetworkUnreachable,
    /// The remote end terminated an established connection.
    ConnectionTerminated,
    /// An underlying syscall failed; the OS error is preserved.
    Io(std::io::Error),

    // ========================================================================
    // Serializer errors
    // ========================================================================
    /// An observed object code has no matching factory registration.
    SerializationError(String),

    // ========================================================================
    // String conversion errors
    // ========================================================================
    /// A string did not parse as the requested numeric type.
    StringNotNumeric,
    /// A string failed to parse for a reason other than non-numeric content.
    StringParseError,

    // ========================================================================
    // Thread / pool lifecycle errors
    // ========================================================================
    /// A task was submitted to a pool that is shutting down.
    TaskRejected,
    /// `join` was called on a thread handle that was already joined or detached.
    ThreadNotJoinable,
    /// An operation required an open file handle that was not open.
    FileNotOpened,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ElementNotFound => write!(f, "element not found"),
            Error::OutOfRange => write!(f, "out of range"),
            Error::TimeoutError => write!(f, "operation timed out"),
            Error::DequeueTimedout => write!(f, "dequeue timed out"),
            Error::ConnectionTimedOut => write!(f, "connection timed out"),
            Error::ConnectionRefused => write!(f, "connection refused"),
            Error::NetworkUnreachable => write!(f, "network unreachable"),
            Error::ConnectionTerminated => write!(f, "connection terminated by peer"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            Error::StringNotNumeric => write!(f, "string is not numeric"),
            Error::StringParseError => write!(f, "string parse error"),
            Error::TaskRejected => write!(f, "task rejected"),
            Error::ThreadNotJoinable => write!(f, "thread not joinable"),
            Error::FileNotOpened => write!(f, "file not opened"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Error::ConnectionTimedOut,
            std::io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                Error::ConnectionTerminated
            }
            _ => Error::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_maps_timeout() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "x").into();
        assert!(matches!(e, Error::ConnectionTimedOut));
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Error::ElementNotFound.to_string(), "element not found");
    }
}
