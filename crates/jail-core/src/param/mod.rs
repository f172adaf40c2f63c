//! Jail parameters
//!
//! Parameters are name/value pairs handed to `jail_get(2)` and `jail_set(2)`:
//! - `Value` - closed set of value shapes the kernel ABI understands
//! - `Params` - ordered, name-unique collection of parameters
//! - `buffer` - flattening of `Params` into the kernel's iovec array
//! - `kind` - table of known parameter names and their decoded types

pub mod buffer;
pub mod kind;

pub use self::buffer::{Entry, IoBuffer};
pub use self::kind::{ParamKind, ParamValue};

use crate::{JailError, Result};
use std::net::Ipv4Addr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// A single parameter value
///
/// Input values are copied into the call's buffer. `Out` values lend their
/// storage to the kernel, which writes the result in place.
#[derive(Debug, PartialEq, Eq)]
pub enum Value<'a> {
    /// Raw bytes, passed as-is
    Bytes(Vec<u8>),
    /// Text, passed with a trailing NUL
    Text(String),
    /// Boolean, passed as a 4-byte integer (the kernel has no native bool)
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Storage the kernel writes into
    Out(OutRef<'a>),
}

/// Caller-owned storage lent to the kernel for an output parameter
#[derive(Debug, PartialEq, Eq)]
pub enum OutRef<'a> {
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    /// Lent to the kernel as a 4-byte integer and written back once the
    /// call's buffer is dropped
    Bool(&'a mut bool),
    /// Fixed-capacity buffer for string and opaque parameters
    Bytes(&'a mut [u8]),
}

impl From<Vec<u8>> for Value<'_> {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value<'_> {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<&Path> for Value<'_> {
    fn from(v: &Path) -> Self {
        let mut bytes = v.as_os_str().as_bytes().to_vec();
        bytes.push(0);
        Self::Bytes(bytes)
    }
}

impl From<Ipv4Addr> for Value<'_> {
    fn from(v: Ipv4Addr) -> Self {
        // in_addr is stored in network byte order
        Self::Bytes(v.octets().to_vec())
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value<'_> {
    fn from(v: i8) -> Self {
        Self::I8(v)
    }
}

impl From<i16> for Value<'_> {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl<'a> From<OutRef<'a>> for Value<'a> {
    fn from(v: OutRef<'a>) -> Self {
        Self::Out(v)
    }
}

impl<'a> From<&'a mut i8> for Value<'a> {
    fn from(v: &'a mut i8) -> Self {
        Self::Out(OutRef::I8(v))
    }
}

impl<'a> From<&'a mut i16> for Value<'a> {
    fn from(v: &'a mut i16) -> Self {
        Self::Out(OutRef::I16(v))
    }
}

impl<'a> From<&'a mut i32> for Value<'a> {
    fn from(v: &'a mut i32) -> Self {
        Self::Out(OutRef::I32(v))
    }
}

impl<'a> From<&'a mut i64> for Value<'a> {
    fn from(v: &'a mut i64) -> Self {
        Self::Out(OutRef::I64(v))
    }
}

impl<'a> From<&'a mut bool> for Value<'a> {
    fn from(v: &'a mut bool) -> Self {
        Self::Out(OutRef::Bool(v))
    }
}

impl<'a> From<&'a mut [u8]> for Value<'a> {
    fn from(v: &'a mut [u8]) -> Self {
        Self::Out(OutRef::Bytes(v))
    }
}

/// Ordered set of named parameters for one `jail_get`/`jail_set` call
///
/// Names are unique. The collection is write-once: it is consumed whole
/// when the call's buffer is built.
#[derive(Debug, Default)]
pub struct Params<'a> {
    entries: Vec<(String, Value<'a>)>,
}

impl<'a> Params<'a> {
    /// Create an empty parameter set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a parameter
    ///
    /// Fails with `DuplicateKey` if `name` is already present; the set is
    /// left unchanged in that case.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value<'a>>) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(JailError::DuplicateKey(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Chaining form of [`Params::add`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value<'a>>) -> Result<Self> {
        self.add(name, value)?;
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Value<'a>)> {
        self.entries
    }
}
