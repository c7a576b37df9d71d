// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffered serialization framework with pluggable sinks.
//!
//! [`Serializable`] is the trait custom types implement to participate in
//! both the stream and random-access serializers; trivially-copyable types
//! (`u32`, `[u8; N]`, ...) serialize through `write_trivial`/`read_trivial`
//! without implementing anything. [`OutputStreamSerializer`] /
//! [`InputStreamSerializer`] buffer writes/reads over any [`Sink`] /
//! [`Source`]; [`OutputRandomAccessSerializer`] / [`InputRandomAccessSerializer`]
//! add seeking over any [`RandomAccessSink`] / [`RandomAccessSource`], falling
//! back to the stream path for polymorphic object writes. [`factory`] is the
//! process-wide object-code registry used to reconstruct `Box<dyn
//! Serializable>` values on read.
//!
//! Grounded on `include/serialization.h`.

pub mod factory;
mod random_access;
mod stream;

pub mod sink;

pub use random_access::{
    InputRandomAccessSerializer, OutputRandomAccessSerializer, RandomAccessSink, RandomAccessSource,
};
pub use stream::{InputStreamSerializer, OutputStreamSerializer, Sink, Source};

use std::any::TypeId;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Compression/encoding preference for a serializer, matching
/// `serialization.h`'s `SerializationLevel`. `rpl` does not implement the
/// encoders itself; the level is a hint a sink or caller may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationLevel {
    /// No compression or encoding.
    #[default]
    Plain,
    /// Simple encodings such as run-length or bit-packing.
    Compacted,
    /// Lightweight compression, e.g. `flate2`'s deflate.
    Compressed,
    /// Best-effort, compute-heavy compression.
    Compressed2,
}

/// A non-zero code derived from `TypeId`, unique per concrete type, used as
/// the wire discriminant for polymorphic reads. Mirrors
/// `Serializable::objectCode`'s `typeid(*this).hash_code()`.
pub fn object_code_of<T: 'static>() -> u64 {
    object_code_from(TypeId::of::<T>())
}

fn object_code_from(id: TypeId) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    let h = hasher.finish();
    if h == 0 {
        1
    } else {
        h
    }
}

/// A type that can write and read itself through the stream serializers.
///
/// The random-access overloads default to delegating into the stream path,
/// matching `serialization.h`'s default `writeObject(OutputRandomAccessSerializer&)`
/// override.
pub trait Serializable: std::any::Any {
    /// A non-zero code unique to the concrete type, used by
    /// [`InputStreamSerializer::read_object_boxed`] to pick a factory
    /// constructor.
    fn object_code(&self) -> u64 {
        object_code_from(self.type_id())
    }

    fn write_object(&self, serializer: &mut OutputStreamSerializer) -> Result<()>;

    fn read_object(&mut self, serializer: &mut InputStreamSerializer) -> Result<()>;

    fn write_object_ra(&self, serializer: &mut OutputRandomAccessSerializer) -> Result<()> {
        serializer.write_object_via_stream(self)
    }

    fn read_object_ra(&mut self, serializer: &mut InputRandomAccessSerializer) -> Result<()> {
        serializer.read_object_via_stream(self)
    }
}

/// Registers `$ty` with the process-wide [`factory`] the first time
/// `<$ty>::ensure_registered()` runs, so `read_object_boxed` can reconstruct
/// instances from their wire object code. Requires `$ty: Default +
/// Serializable`.
#[macro_export]
macro_rules! register_serializable {
    ($ty:ty) => {
        impl $ty {
            /// Registers this type with the serializer factory, once.
            pub fn ensure_registered() {
                static ONCE: ::std::sync::Once = ::std::sync::Once::new();
                ONCE.call_once(|| {
                    $crate::ser::factory::register($crate::ser::object_code_of::<$ty>(), || {
                        ::std::boxed::Box::new(<$ty as ::std::default::Default>::default())
                            as ::std::boxed::Box<dyn $crate::ser::Serializable>
                    });
                });
            }
        }
    };
}
