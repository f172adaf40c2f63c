//! Flattening of parameters into the kernel's iovec array
//!
//! `jail_get(2)` and `jail_set(2)` take an array of iovecs in which every
//! parameter name (a NUL-terminated string) is immediately followed by its
//! value. The kernel dereferences every iovec synchronously while the call
//! runs, so the memory behind them must stay put until it returns.
//!
//! Input values are copied into a single arena owned by the `IoBuffer`; the
//! arena is never touched through the `Vec` again once the iovecs are taken,
//! so its heap storage cannot move. Output values point straight at the
//! caller's storage, which stays mutably borrowed for the buffer's lifetime.
//! Booleans are the exception: the kernel writes a 4-byte integer, so an
//! arena slot stands in and is copied back when the buffer is dropped.

use super::{OutRef, Params, Value};
use crate::config::ERRMSG_CAPACITY;
use crate::{JailError, Result};
use std::marker::PhantomData;

/// Name of the parameter the kernel writes its error text into
pub const ERRMSG_PARAM: &str = "errmsg";

/// Where a segment's bytes live before the arena is frozen
#[derive(Debug)]
enum Slot {
    /// Range in the buffer's own arena
    Arena { offset: usize, len: usize },
    /// Caller storage lent through an `OutRef`
    Borrowed { ptr: *mut u8, len: usize },
}

/// Boolean output references and the arena offset of their stand-in int
type BoolTargets<'a> = Vec<(usize, &'a mut bool)>;

/// Encode one value into `arena`
///
/// Input values are copied (booleans widened to a 4-byte int, text given a
/// trailing NUL). Output references are not copied: the returned slot points
/// at the referenced storage itself so the caller observes the kernel's write.
fn encode_value<'a>(
    value: Value<'a>,
    arena: &mut Vec<u8>,
    bools: &mut BoolTargets<'a>,
) -> Result<Slot> {
    let slot = match value {
        Value::Bytes(bytes) => {
            if bytes.is_empty() {
                return Err(JailError::InvalidValue("empty byte sequence"));
            }
            push(arena, &bytes)
        }
        Value::Text(text) => {
            // The kernel would stop reading at the first NUL
            if text.contains('\0') {
                return Err(JailError::InvalidValue("interior NUL in text"));
            }
            let mut bytes = text.into_bytes();
            bytes.push(0);
            push(arena, &bytes)
        }
        Value::Bool(b) => push(arena, &i32::from(b).to_ne_bytes()),
        Value::I8(n) => push(arena, &n.to_ne_bytes()),
        Value::I16(n) => push(arena, &n.to_ne_bytes()),
        Value::I32(n) => push(arena, &n.to_ne_bytes()),
        Value::I64(n) => push(arena, &n.to_ne_bytes()),
        Value::Out(out) => borrow_out(out, arena, bools)?,
    };
    Ok(slot)
}

fn push(arena: &mut Vec<u8>, bytes: &[u8]) -> Slot {
    let offset = arena.len();
    arena.extend_from_slice(bytes);
    Slot::Arena {
        offset,
        len: bytes.len(),
    }
}

fn borrow_out<'a>(
    out: OutRef<'a>,
    arena: &mut Vec<u8>,
    bools: &mut BoolTargets<'a>,
) -> Result<Slot> {
    let (ptr, len) = match out {
        OutRef::Bool(target) => {
            let offset = arena.len();
            let slot = push(arena, &i32::from(*target).to_ne_bytes());
            bools.push((offset, target));
            return Ok(slot);
        }
        OutRef::I8(r) => (std::ptr::from_mut(r).cast::<u8>(), size_of::<i8>()),
        OutRef::I16(r) => (std::ptr::from_mut(r).cast::<u8>(), size_of::<i16>()),
        OutRef::I32(r) => (std::ptr::from_mut(r).cast::<u8>(), size_of::<i32>()),
        OutRef::I64(r) => (std::ptr::from_mut(r).cast::<u8>(), size_of::<i64>()),
        OutRef::Bytes(buf) => {
            if buf.is_empty() {
                return Err(JailError::InvalidValue("empty output buffer"));
            }
            (buf.as_mut_ptr(), buf.len())
        }
    };
    Ok(Slot::Borrowed { ptr, len })
}

fn push_name(arena: &mut Vec<u8>, name: &str) -> Result<Slot> {
    if name.as_bytes().contains(&0) {
        return Err(JailError::invalid_parameter(name));
    }
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    Ok(push(arena, &bytes))
}

/// Scatter/gather buffer for one `jail_get`/`jail_set` call
///
/// Holds every name and input value in one arena and keeps the output
/// references it was built from borrowed for `'a`, so neither can be freed
/// or read by the caller while the kernel may still be writing.
#[derive(Debug)]
pub struct IoBuffer<'a> {
    /// Backing storage for names and copied input values
    arena: Vec<u8>,
    /// One iovec per name and per value, in pairs
    iov: Vec<libc::iovec>,
    /// Index of the errmsg value iovec, if one was requested
    errmsg: Option<usize>,
    /// Written back from the arena on drop
    bools: BoolTargets<'a>,
    _borrowed: PhantomData<&'a mut [u8]>,
}

impl<'a> IoBuffer<'a> {
    /// Build the buffer for `params`
    ///
    /// Fails with `InvalidParameter(name)` on the first value that cannot be
    /// encoded; nothing is handed out in that case.
    pub fn build(params: Params<'a>) -> Result<Self> {
        Self::assemble(params, false)
    }

    /// Like [`IoBuffer::build`], also reserving an `errmsg` parameter the
    /// kernel fills with a description of any failure
    ///
    /// No region is reserved when `params` already carries `errmsg`.
    pub fn with_errmsg(params: Params<'a>) -> Result<Self> {
        let reserve = !params.contains(ERRMSG_PARAM);
        Self::assemble(params, reserve)
    }

    fn assemble(params: Params<'a>, reserve_errmsg: bool) -> Result<Self> {
        let entries = params.into_entries();
        let mut arena = Vec::new();
        let mut bools = Vec::new();
        let mut slots = Vec::with_capacity(entries.len() * 2 + 2);

        for (name, value) in entries {
            slots.push(push_name(&mut arena, &name)?);
            let slot = encode_value(value, &mut arena, &mut bools).map_err(|e| {
                tracing::debug!(param = %name, error = %e, "rejecting parameter value");
                JailError::invalid_parameter(name.as_str())
            })?;
            tracing::trace!(param = %name, "encoded parameter");
            slots.push(slot);
        }

        let mut errmsg = None;
        if reserve_errmsg {
            slots.push(push_name(&mut arena, ERRMSG_PARAM)?);
            let offset = arena.len();
            arena.resize(offset + ERRMSG_CAPACITY, 0);
            errmsg = Some(slots.len());
            slots.push(Slot::Arena {
                offset,
                len: ERRMSG_CAPACITY,
            });
        }

        // The arena is complete; its storage stays where it is from here on.
        let base = arena.as_mut_ptr();
        let iov = slots
            .into_iter()
            .map(|slot| {
                let (ptr, len) = match slot {
                    Slot::Arena { offset, len } => (base.wrapping_add(offset), len),
                    Slot::Borrowed { ptr, len } => (ptr, len),
                };
                libc::iovec {
                    iov_base: ptr.cast(),
                    iov_len: len,
                }
            })
            .collect();

        Ok(Self {
            arena,
            iov,
            errmsg,
            bools,
            _borrowed: PhantomData,
        })
    }

    /// Number of iovecs (twice the number of parameters)
    #[must_use]
    pub fn len(&self) -> usize {
        self.iov.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iov.is_empty()
    }

    /// The iovec array to pass to the kernel
    ///
    /// Every iovec stays valid for as long as `self` is borrowed.
    pub fn as_mut_iovecs(&mut self) -> &mut [libc::iovec] {
        &mut self.iov
    }

    /// Name/value views over the buffer, one per parameter
    ///
    /// This is the kernel's view of the call, used by kernels that are not
    /// reached through a raw syscall.
    pub fn entries_mut(&mut self) -> Vec<Entry<'_>> {
        self.iov
            .chunks_exact(2)
            .map(|pair| {
                // SAFETY: every iovec points at a live region of at least
                // iov_len bytes (the arena, or storage borrowed for 'a), the
                // regions are pairwise disjoint, and `&mut self` keeps them
                // exclusive for the returned lifetime.
                let name = unsafe {
                    std::slice::from_raw_parts(pair[0].iov_base.cast::<u8>(), pair[0].iov_len)
                };
                let value = unsafe {
                    std::slice::from_raw_parts_mut(pair[1].iov_base.cast::<u8>(), pair[1].iov_len)
                };
                let name = name.strip_suffix(&[0u8]).unwrap_or(name);
                Entry {
                    name: std::str::from_utf8(name).unwrap_or_default(),
                    value,
                }
            })
            .collect()
    }

    /// Error text the kernel left in the reserved `errmsg` parameter
    #[must_use]
    pub fn errmsg(&self) -> Option<String> {
        let iov = self.iov.get(self.errmsg?)?;
        // SAFETY: the errmsg iovec points into the arena, which lives as
        // long as `self`.
        let bytes = unsafe { std::slice::from_raw_parts(iov.iov_base.cast::<u8>(), iov.iov_len) };
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        (end > 0).then(|| String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Total bytes held in the arena
    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }
}

impl Drop for IoBuffer<'_> {
    fn drop(&mut self) {
        for (offset, target) in &mut self.bools {
            let value = self
                .arena
                .get(*offset..*offset + size_of::<i32>())
                .and_then(|bytes| bytes.try_into().ok())
                .map(i32::from_ne_bytes);
            if let Some(value) = value {
                **target = value != 0;
            }
        }
    }
}

/// One parameter as seen through an `IoBuffer`
#[derive(Debug)]
pub struct Entry<'b> {
    /// Parameter name without its NUL terminator
    pub name: &'b str,
    /// Value bytes; writes land in the caller's storage for output values
    pub value: &'b mut [u8],
}
