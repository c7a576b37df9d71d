// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Integration coverage for `rpl::ser`: stream/random-access round trips
//! over the `MemorySink`/`FileSink`/`TcpSink` backends, and the polymorphic
//! object-code factory path including the null-pointer case.

use std::net::{TcpListener, TcpStream};

use rpl::error::{Error, Result};
use rpl::ser::sink::{FileSink, MemorySink, TcpSink};
use rpl::ser::{
    InputRandomAccessSerializer, InputStreamSerializer, OutputRandomAccessSerializer,
    OutputStreamSerializer, Serializable,
};
use rpl::register_serializable;

#[derive(Default, Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

register_serializable!(Point);

impl Serializable for Point {
    fn write_object(&self, serializer: &mut OutputStreamSerializer) -> Result<()> {
        serializer.write_trivial(&self.x)?;
        serializer.write_trivial(&self.y)
    }

    fn read_object(&mut self, serializer: &mut InputStreamSerializer) -> Result<()> {
        self.x = serializer.read_trivial()?;
        self.y = serializer.read_trivial()?;
        Ok(())
    }
}

#[test]
fn stream_serializer_round_trips_an_object_through_memory() {
    let sink = MemorySink::new();
    let handle = sink.clone();
    let mut out = OutputStreamSerializer::new(sink);
    let p = Point { x: 3, y: -7 };
    out.write_object(&p).unwrap();
    out.flush().unwrap();

    handle.rewind();
    let mut input = InputStreamSerializer::new(handle);
    let mut decoded = Point::default();
    input.read_object(&mut decoded).unwrap();
    assert_eq!(decoded, p);
}

#[test]
fn factory_round_trips_a_boxed_polymorphic_object() {
    Point::ensure_registered();

    let sink = MemorySink::new();
    let handle = sink.clone();
    let mut out = OutputStreamSerializer::new(sink);
    let boxed: Box<dyn Serializable> = Box::new(Point { x: 1, y: 2 });
    out.write_object_opt(Some(boxed.as_ref())).unwrap();
    out.flush().unwrap();

    handle.rewind();
    let mut input = InputStreamSerializer::new(handle);
    let mut slot: Option<Box<dyn Serializable>> = None;
    input.read_object_boxed(&mut slot).unwrap();
    assert!(slot.is_some());
}

#[test]
fn factory_null_pointer_round_trip_leaves_slot_empty() {
    let sink = MemorySink::new();
    let handle = sink.clone();
    let mut out = OutputStreamSerializer::new(sink);
    out.write_object_opt(None).unwrap();
    out.flush().unwrap();

    handle.rewind();
    let mut input = InputStreamSerializer::new(handle);
    let mut slot: Option<Box<dyn Serializable>> = None;
    input.read_object_boxed(&mut slot).unwrap();
    assert!(slot.is_none());
}

#[test]
fn random_access_serializer_seeks_over_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ra.bin");

    {
        let sink = FileSink::open(&path).unwrap();
        let mut out = OutputRandomAccessSerializer::new(sink);
        out.write_trivial(&1u32).unwrap();
        out.write_trivial(&2u32).unwrap();
        out.write_trivial(&3u32).unwrap();
        out.flush().unwrap();
    }

    let source = FileSink::open(&path).unwrap();
    let mut input = InputRandomAccessSerializer::new(source);
    input.seek_to(4).unwrap();
    let second: u32 = input.read_trivial().unwrap();
    assert_eq!(second, 2);
    input.seek_to(0).unwrap();
    let first: u32 = input.read_trivial().unwrap();
    assert_eq!(first, 1);
}

#[test]
fn tcp_sink_round_trips_a_value_over_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let writer = std::thread::spawn(move || {
        let stream = TcpStream::connect(addr).unwrap();
        let mut out = OutputStreamSerializer::new(TcpSink::new(stream));
        out.write_trivial(&0xdead_beefu32).unwrap();
        out.flush().unwrap();
    });

    let (stream, _) = listener.accept().unwrap();
    let mut input = InputStreamSerializer::new(TcpSink::new(stream));
    let value: u32 = input.read_trivial().unwrap();
    assert_eq!(value, 0xdead_beef);

    writer.join().unwrap();
}

#[test]
fn create_unregistered_object_code_errors() {
    use rpl::ser::factory;
    assert!(matches!(factory::create(0x1234_5678), Err(Error::ElementNotFound)));
}
