// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete [`Sink`](super::Sink)/[`Source`](super::Source) implementations.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::rc::Rc;

use super::random_access::{RandomAccessSink, RandomAccessSource};
use super::stream::{Sink, Source};
use crate::error::{Error, Result};

/// A growable in-memory byte buffer usable as both a sink and a source.
///
/// Cloning shares the underlying buffer (cheap `Rc` bump), so a caller can
/// keep a handle to inspect bytes written by a serializer, or rewind the
/// same buffer to read back what was written.
#[derive(Clone)]
pub struct MemorySink {
    state: Rc<RefCell<MemoryState>>,
}

struct MemoryState {
    buf: Vec<u8>,
    read_cursor: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryState {
                buf: Vec::new(),
                read_cursor: 0,
            })),
        }
    }

    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryState { buf, read_cursor: 0 })),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.state.borrow().buf.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resets the read cursor to the beginning, so previously written bytes
    /// can be read back from the start.
    pub fn rewind(&self) {
        self.state.borrow_mut().read_cursor = 0;
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().buf.extend_from_slice(data);
        Ok(())
    }
}

impl Source for MemorySink {
    fn read(&mut self, data: &mut [u8], min_len: usize, max_len: usize) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        let available = state.buf.len() - state.read_cursor;
        if available < min_len {
            return Err(Error::OutOfRange);
        }
        let n = available.min(max_len);
        let cursor = state.read_cursor;
        data[..n].copy_from_slice(&state.buf[cursor..cursor + n]);
        state.read_cursor += n;
        Ok(n)
    }
}

impl RandomAccessSink for MemorySink {
    fn write_at(&mut self, position: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let end = position as usize + data.len();
        if state.buf.len() < end {
            state.buf.resize(end, 0);
        }
        state.buf[position as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        Ok(u64::MAX)
    }
}

impl RandomAccessSource for MemorySink {
    fn read_at(&mut self, position: u64, data: &mut [u8]) -> Result<()> {
        let state = self.state.borrow();
        let end = position as usize + data.len();
        if end > state.buf.len() {
            return Err(Error::OutOfRange);
        }
        data.copy_from_slice(&state.buf[position as usize..end]);
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        Ok(self.state.borrow().buf.len() as u64)
    }
}

/// A positional sink/source over a [`std::fs::File`], using `pread`/`pwrite`
/// (via `FileExt`) for the random-access path and plain sequential
/// `Read`/`Write` for the stream path.
pub struct FileSink {
    file: File,
    write_pos: u64,
    read_pos: u64,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file,
            write_pos: 0,
            read_pos: 0,
        })
    }

    pub fn from_file(file: File) -> Self {
        Self {
            file,
            write_pos: 0,
            read_pos: 0,
        }
    }
}

impl Sink for FileSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.write_pos += data.len() as u64;
        Ok(())
    }
}

impl Source for FileSink {
    fn read(&mut self, data: &mut [u8], min_len: usize, max_len: usize) -> Result<usize> {
        let mut total = 0;
        while total < min_len {
            let n = self.file.read(&mut data[total..max_len])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        if total < min_len {
            return Err(Error::OutOfRange);
        }
        self.read_pos += total as u64;
        Ok(total)
    }
}

impl RandomAccessSink for FileSink {
    fn write_at(&mut self, position: u64, data: &[u8]) -> Result<()> {
        self.file.write_at(data, position)?;
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl RandomAccessSource for FileSink {
    fn read_at(&mut self, position: u64, data: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(data, position)?;
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// A blocking sink/source over a [`std::net::TcpStream`]. TCP has no stable
/// notion of position, so only the stream (not random-access) traits are
/// implemented; short reads are retried until `min_len` bytes accumulate.
pub struct TcpSink {
    stream: TcpStream,
}

impl TcpSink {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Sink for TcpSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }
}

impl Source for TcpSink {
    fn read(&mut self, data: &mut [u8], min_len: usize, max_len: usize) -> Result<usize> {
        let mut total = 0;
        while total < min_len {
            match self.stream.read(&mut data[total..max_len]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if total < min_len {
            return Err(Error::ConnectionTerminated);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_write_then_rewind_read() {
        let mut sink = MemorySink::new();
        sink.write(&[1, 2, 3, 4]).unwrap();
        sink.rewind();
        let mut buf = [0u8; 4];
        let mut source = sink.clone();
        let n = source.read(&mut buf, 4, 4).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn memory_sink_random_access_write_at_grows_buffer() {
        let mut sink = MemorySink::new();
        RandomAccessSink::write_at(&mut sink, 4, &[9, 9]).unwrap();
        assert_eq!(sink.to_vec(), vec![0, 0, 0, 0, 9, 9]);
    }

    #[test]
    fn memory_sink_read_short_of_min_len_errors() {
        let mut sink = MemorySink::new();
        sink.write(&[1]).unwrap();
        sink.rewind();
        let mut buf = [0u8; 4];
        assert!(matches!(sink.read(&mut buf, 4, 4), Err(Error::OutOfRange)));
    }
}
