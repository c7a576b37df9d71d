// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::cell::RefCell;
use std::rc::Rc;

use super::stream::{InputStreamSerializer, OutputStreamSerializer, Sink, Source};
use super::{SerializationLevel, Serializable};
use crate::error::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A positional byte destination with a known, possibly lazily-queried,
/// length. Mirrors `OutputRandomAccessSerializer::_writeAt`/`_getLength`.
pub trait RandomAccessSink {
    fn write_at(&mut self, position: u64, data: &[u8]) -> Result<()>;
    fn length(&self) -> Result<u64>;
}

/// A positional byte source with a known length. Mirrors
/// `InputRandomAccessSerializer::_readAt`/`_getLength`.
pub trait RandomAccessSource {
    fn read_at(&mut self, position: u64, data: &mut [u8]) -> Result<()>;
    fn length(&self) -> Result<u64>;
}

struct OutputState {
    sink: Box<dyn RandomAccessSink>,
    position: u64,
    length: Option<u64>,
}

impl OutputState {
    fn length(&mut self) -> Result<u64> {
        if self.length.is_none() {
            self.length = Some(self.sink.length()?);
        }
        Ok(self.length.unwrap())
    }
}

/// Adapts the shared [`OutputState`] into a [`Sink`], so the buffering logic
/// in [`OutputStreamSerializer`] can be reused instead of duplicated.
struct OutputAdapter(Rc<RefCell<OutputState>>);

impl Sink for OutputAdapter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.0.borrow_mut();
        let len = state.length()?;
        if state.position + data.len() as u64 > len {
            return Err(Error::OutOfRange);
        }
        let pos = state.position;
        state.sink.write_at(pos, data)?;
        state.position += data.len() as u64;
        Ok(())
    }
}

/// An [`OutputStreamSerializer`] that also supports seeking over a
/// [`RandomAccessSink`], matching `OutputRandomAccessSerializer`.
///
/// Stores its sink as `Box<dyn RandomAccessSink>` (rather than being generic
/// over the sink type) so [`Serializable::write_object_ra`] stays
/// object-safe for `Box<dyn Serializable>` factory values.
pub struct OutputRandomAccessSerializer {
    stream: OutputStreamSerializer,
    state: Rc<RefCell<OutputState>>,
}

impl OutputRandomAccessSerializer {
    pub fn new(sink: impl RandomAccessSink + 'static) -> Self {
        Self::with_capacity(sink, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(sink: impl RandomAccessSink + 'static, capacity: usize) -> Self {
        let state = Rc::new(RefCell::new(OutputState {
            sink: Box::new(sink),
            position: 0,
            length: None,
        }));
        let stream = OutputStreamSerializer::with_capacity(OutputAdapter(state.clone()), capacity);
        Self { stream, state }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }

    pub fn lock(&mut self) -> &mut Self {
        self.stream.lock();
        self
    }

    pub fn commit(&mut self) -> &mut Self {
        self.stream.commit();
        self
    }

    pub fn set_level(&mut self, level: SerializationLevel) -> &mut Self {
        self.stream.set_level(level);
        self
    }

    pub fn level(&self) -> SerializationLevel {
        self.stream.level()
    }

    /// The current logical write position: bytes already handed to the
    /// sink, plus whatever sits unflushed in the buffer.
    pub fn tell(&self) -> u64 {
        self.state.borrow().position + self.stream.unflushed_len() as u64
    }

    pub fn length(&self) -> Result<u64> {
        self.state.borrow_mut().length()
    }

    pub fn remaining(&self) -> Result<u64> {
        Ok(self.length()? - self.tell())
    }

    /// Flushes, then jumps the underlying position directly to `position`.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        if position == self.tell() {
            return Ok(());
        }
        if position > self.length()? {
            return Err(Error::OutOfRange);
        }
        self.flush()?;
        self.state.borrow_mut().position = position;
        Ok(())
    }

    pub fn seek(&mut self, displacement: i64) -> Result<()> {
        let new_pos = self.tell() as i64 + displacement;
        if new_pos < 0 {
            return Err(Error::OutOfRange);
        }
        self.seek_to(new_pos as u64)
    }

    pub fn align_forward(&mut self, alignment: u64) -> Result<()> {
        let pos = self.tell();
        if pos % alignment != 0 {
            self.seek_to(pos / alignment * alignment + alignment)?;
        }
        Ok(())
    }

    pub fn align_backward(&mut self, alignment: u64) -> Result<()> {
        let pos = self.tell();
        if pos % alignment != 0 {
            self.seek_to(pos / alignment * alignment)?;
        }
        Ok(())
    }

    pub fn put(&mut self, data: &[u8]) -> Result<()> {
        self.stream.put(data)
    }

    pub fn write_trivial<T: Copy>(&mut self, x: &T) -> Result<()> {
        self.stream.write_trivial(x)
    }

    pub fn write_object(&mut self, object: &dyn Serializable) -> Result<()> {
        object.write_object_ra(self)
    }

    /// Used by [`Serializable::write_object_ra`]'s default implementation to
    /// fall back to the plain stream write path.
    pub(crate) fn write_object_via_stream(&mut self, object: &dyn Serializable) -> Result<()> {
        self.stream.write_object(object)
    }
}

struct InputState {
    source: Box<dyn RandomAccessSource>,
    position: u64,
    length: Option<u64>,
}

impl InputState {
    fn length(&mut self) -> Result<u64> {
        if self.length.is_none() {
            self.length = Some(self.source.length()?);
        }
        Ok(self.length.unwrap())
    }
}

struct InputAdapter(Rc<RefCell<InputState>>);

impl Source for InputAdapter {
    fn read(&mut self, data: &mut [u8], min_len: usize, max_len: usize) -> Result<usize> {
        let mut state = self.0.borrow_mut();
        let len = state.length()?;
        let remaining = len - state.position;
        if remaining < min_len as u64 {
            return Err(Error::OutOfRange);
        }
        let n = (max_len as u64).min(remaining) as usize;
        let pos = state.position;
        state.source.read_at(pos, &mut data[..n])?;
        state.position += n as u64;
        Ok(n)
    }
}

/// An [`InputStreamSerializer`] that also supports seeking over a
/// [`RandomAccessSource`], matching `InputRandomAccessSerializer`.
pub struct InputRandomAccessSerializer {
    stream: InputStreamSerializer,
    state: Rc<RefCell<InputState>>,
}

impl InputRandomAccessSerializer {
    pub fn new(source: impl RandomAccessSource + 'static) -> Self {
        Self::with_capacity(source, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(source: impl RandomAccessSource + 'static, capacity: usize) -> Self {
        let state = Rc::new(RefCell::new(InputState {
            source: Box::new(source),
            position: 0,
            length: None,
        }));
        let stream = InputStreamSerializer::with_capacity(InputAdapter(state.clone()), capacity);
        Self { stream, state }
    }

    pub fn set_level(&mut self, level: SerializationLevel) -> &mut Self {
        self.stream.set_level(level);
        self
    }

    pub fn level(&self) -> SerializationLevel {
        self.stream.level()
    }

    /// The logical read position: bytes fetched from the source, minus
    /// whatever sits unread in the buffer.
    pub fn tell(&self) -> u64 {
        self.state.borrow().position - self.stream.unread_available() as u64
    }

    pub fn length(&self) -> Result<u64> {
        self.state.borrow_mut().length()
    }

    pub fn remaining(&self) -> Result<u64> {
        Ok(self.length()? - self.tell())
    }

    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        if position > self.length()? {
            return Err(Error::OutOfRange);
        }
        self.stream.empty_buffer();
        self.state.borrow_mut().position = position;
        Ok(())
    }

    pub fn seek(&mut self, displacement: i64) -> Result<()> {
        let new_pos = self.tell() as i64 + displacement;
        if new_pos < 0 {
            return Err(Error::OutOfRange);
        }
        self.seek_to(new_pos as u64)
    }

    pub fn align_forward(&mut self, alignment: u64) -> Result<()> {
        let pos = self.tell();
        if pos % alignment != 0 {
            self.seek_to(pos / alignment * alignment + alignment)?;
        }
        Ok(())
    }

    pub fn align_backward(&mut self, alignment: u64) -> Result<()> {
        let pos = self.tell();
        if pos % alignment != 0 {
            self.seek_to(pos / alignment * alignment)?;
        }
        Ok(())
    }

    pub fn get(&mut self, data: &mut [u8]) -> Result<()> {
        self.stream.get(data)
    }

    pub fn read_trivial<T: Copy>(&mut self) -> Result<T> {
        self.stream.read_trivial()
    }

    pub fn read_object(&mut self, object: &mut dyn Serializable) -> Result<()> {
        object.read_object_ra(self)
    }

    pub(crate) fn read_object_via_stream(&mut self, object: &mut dyn Serializable) -> Result<()> {
        self.stream.read_object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::sink::MemorySink;

    #[test]
    fn seek_to_and_tell_track_position() {
        let mut out = OutputRandomAccessSerializer::new(MemorySink::new());
        out.write_trivial(&1u32).unwrap();
        out.write_trivial(&2u32).unwrap();
        assert_eq!(out.tell(), 8);
        out.seek_to(0).unwrap();
        assert_eq!(out.tell(), 0);
    }

    #[test]
    fn write_past_fixed_length_sink_errors() {
        struct Fixed(Vec<u8>);
        impl RandomAccessSink for Fixed {
            fn write_at(&mut self, position: u64, data: &[u8]) -> Result<()> {
                let end = position as usize + data.len();
                self.0[position as usize..end].copy_from_slice(data);
                Ok(())
            }
            fn length(&self) -> Result<u64> {
                Ok(self.0.len() as u64)
            }
        }
        let mut out = OutputRandomAccessSerializer::with_capacity(Fixed(vec![0u8; 4]), 4);
        assert!(matches!(out.write_trivial(&123u64), Err(Error::OutOfRange)));
    }

    #[test]
    fn align_forward_rounds_up_to_next_boundary() {
        let mut out = OutputRandomAccessSerializer::new(MemorySink::new());
        out.write_trivial(&1u8).unwrap();
        out.align_forward(8).unwrap();
        assert_eq!(out.tell(), 8);
    }
}
