//! jail_get/jail_set/jail_attach/jail_remove wrappers
//!
//! - `table` - syscall numbers and flag words
//! - `host` - the running kernel
//!
//! Backends implement [`Kernel`] and report bare errnos; the wrappers here
//! turn those into [`JailError`]s, so every backend shares one error mapping.

pub mod host;
pub mod table;

pub use self::host::Host;
pub use self::table::{GetFlags, SetFlags, SyscallTable};

use crate::param::{IoBuffer, Params};
use crate::{JailError, Result};
use nix::errno::Errno;

/// A kernel implementing the jail entry points
///
/// `jail_get` and `jail_set` receive the whole buffer by mutable reference,
/// so the memory behind every iovec outlives the call.
pub trait Kernel {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, flags: GetFlags) -> std::result::Result<i32, Errno>;
    fn jail_set(&self, buf: &mut IoBuffer<'_>, flags: SetFlags) -> std::result::Result<i32, Errno>;
    fn jail_attach(&self, jid: i32) -> std::result::Result<(), Errno>;
    fn jail_remove(&self, jid: i32) -> std::result::Result<(), Errno>;
}

impl<K: Kernel + ?Sized> Kernel for &K {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, flags: GetFlags) -> std::result::Result<i32, Errno> {
        (**self).jail_get(buf, flags)
    }

    fn jail_set(&self, buf: &mut IoBuffer<'_>, flags: SetFlags) -> std::result::Result<i32, Errno> {
        (**self).jail_set(buf, flags)
    }

    fn jail_attach(&self, jid: i32) -> std::result::Result<(), Errno> {
        (**self).jail_attach(jid)
    }

    fn jail_remove(&self, jid: i32) -> std::result::Result<(), Errno> {
        (**self).jail_remove(jid)
    }
}

/// Text for an `EINVAL`: the kernel's own message when it wrote one
fn rejection(buf: &IoBuffer<'_>, errno: Errno) -> JailError {
    JailError::InvalidParameter {
        detail: buf.errmsg().unwrap_or_else(|| errno.desc().to_owned()),
        errno: Some(errno),
    }
}

/// jail_get(2)
///
/// Returns the jid of the matching jail.
pub fn get<K: Kernel + ?Sized>(kernel: &K, buf: &mut IoBuffer<'_>, flags: GetFlags) -> Result<i32> {
    let res = kernel.jail_get(buf, flags);
    tracing::debug!(segments = buf.len(), flags = ?flags, result = ?res, "jail_get");
    res.map_err(|errno| match errno {
        Errno::EFAULT => JailError::OutOfBounds,
        Errno::ENOENT => JailError::NotFound(errno),
        Errno::EINVAL => rejection(buf, errno),
        other => JailError::SyscallFailed(other),
    })
}

/// jail_set(2)
///
/// Creates or modifies a jail and returns its jid.
pub fn set<K: Kernel + ?Sized>(kernel: &K, buf: &mut IoBuffer<'_>, flags: SetFlags) -> Result<i32> {
    let res = kernel.jail_set(buf, flags);
    tracing::debug!(segments = buf.len(), flags = ?flags, result = ?res, "jail_set");
    res.map_err(|errno| match errno {
        Errno::EPERM => JailError::PermissionDenied,
        Errno::EFAULT => JailError::OutOfBounds,
        // Unknown parameters and wrongly sized ones share EINVAL
        Errno::EINVAL => rejection(buf, errno),
        Errno::EEXIST => JailError::UpdateFlagRequired,
        Errno::ENAMETOOLONG => JailError::NameTooLong,
        Errno::EAGAIN => JailError::IdentifierSpaceExhausted,
        other => JailError::SyscallFailed(other),
    })
}

fn attach_remove_error(errno: Errno) -> JailError {
    match errno {
        Errno::EPERM => JailError::UnprivilegedCaller,
        // Both calls report a missing jail as EINVAL
        Errno::EINVAL => JailError::NotFound(errno),
        other => JailError::SyscallFailed(other),
    }
}

/// jail_attach(2): move the calling process into the jail
pub fn attach<K: Kernel + ?Sized>(kernel: &K, jid: i32) -> Result<()> {
    let res = kernel.jail_attach(jid);
    tracing::debug!(jid, result = ?res, "jail_attach");
    res.map_err(attach_remove_error)
}

/// jail_remove(2)
pub fn remove<K: Kernel + ?Sized>(kernel: &K, jid: i32) -> Result<()> {
    let res = kernel.jail_remove(jid);
    tracing::debug!(jid, result = ?res, "jail_remove");
    res.map_err(attach_remove_error)
}

/// Build the buffer for `params` and issue jail_get(2)
pub fn get_params<K: Kernel + ?Sized>(kernel: &K, params: Params<'_>, flags: GetFlags) -> Result<i32> {
    let mut buf = IoBuffer::with_errmsg(params)?;
    get(kernel, &mut buf, flags)
}

/// Build the buffer for `params` and issue jail_set(2)
pub fn set_params<K: Kernel + ?Sized>(kernel: &K, params: Params<'_>, flags: SetFlags) -> Result<i32> {
    let mut buf = IoBuffer::with_errmsg(params)?;
    set(kernel, &mut buf, flags)
}
