// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide registry mapping object codes to constructors, used by
//! [`super::InputStreamSerializer::read_object_boxed`] to reconstruct
//! polymorphic `Box<dyn Serializable>` values. Mirrors the static-init
//! `Factory::createObject` registration in `include/serialization.h` and
//! `include/factory.h`; types register themselves through the
//! [`crate::register_serializable`] macro.

use std::sync::OnceLock;

use parking_lot::Mutex;

use super::Serializable;
use crate::error::{Error, Result};
use crate::table::HashMap;

type Constructor = fn() -> Box<dyn Serializable>;

static REGISTRY: OnceLock<Mutex<HashMap<u64, Constructor>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<u64, Constructor>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers `ctor` under `code`, overwriting any previous registration for
/// the same code.
pub fn register(code: u64, ctor: Constructor) {
    registry().lock().put(code, ctor);
}

/// Constructs a fresh instance for `code`.
///
/// # Errors
/// Returns [`Error::ElementNotFound`] if no type has registered `code`.
pub fn create(code: u64) -> Result<Box<dyn Serializable>> {
    let guard = registry().lock();
    match guard.get(&code) {
        Some(ctor) => Ok((*ctor)()),
        None => Err(Error::ElementNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::{InputStreamSerializer, OutputStreamSerializer};

    #[derive(Default)]
    struct Ping {
        n: u32,
    }

    crate::register_serializable!(Ping);

    impl Serializable for Ping {
        fn write_object(&self, serializer: &mut OutputStreamSerializer) -> Result<()> {
            serializer.write_trivial(&self.n)
        }

        fn read_object(&mut self, serializer: &mut InputStreamSerializer) -> Result<()> {
            self.n = serializer.read_trivial()?;
            Ok(())
        }
    }

    #[test]
    fn register_then_create_round_trips_object_code() {
        Ping::ensure_registered();
        let code = super::super::object_code_of::<Ping>();
        let created = create(code).unwrap();
        assert_eq!(created.object_code(), code);
    }

    #[test]
    fn create_unregistered_code_errors() {
        assert!(matches!(create(0xdead_beef), Err(Error::ElementNotFound)));
    }
}
