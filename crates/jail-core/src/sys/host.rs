//! The running kernel, reached through raw syscalls

use super::table::{FREEBSD, GetFlags, SetFlags, SyscallTable};
use super::Kernel;
use crate::param::IoBuffer;
use nix::errno::Errno;

/// The host kernel
///
/// Only FreeBSD provides the jail syscalls; on any other target every call
/// fails with `ENOSYS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host {
    table: SyscallTable,
}

impl Host {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_table(FREEBSD)
    }

    /// Use a different set of syscall numbers
    #[must_use]
    pub const fn with_table(table: SyscallTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub const fn table(&self) -> &SyscallTable {
        &self.table
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "freebsd")]
impl Host {
    fn iov_call(&self, num: libc::c_int, buf: &mut IoBuffer<'_>, flags: libc::c_int) -> Result<i32, Errno> {
        let iov = buf.as_mut_iovecs();
        let niov = libc::c_uint::try_from(iov.len()).map_err(|_| Errno::E2BIG)?;
        // SAFETY: every iovec points at memory owned or borrowed by `buf`,
        // which stays mutably borrowed until the syscall has returned.
        let ret = unsafe { libc::syscall(num, iov.as_mut_ptr(), niov, flags) };
        Errno::result(ret)
    }
}

#[cfg(target_os = "freebsd")]
impl Kernel for Host {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, flags: GetFlags) -> Result<i32, Errno> {
        self.iov_call(self.table.get, buf, flags.bits())
    }

    fn jail_set(&self, buf: &mut IoBuffer<'_>, flags: SetFlags) -> Result<i32, Errno> {
        self.iov_call(self.table.set, buf, flags.bits())
    }

    fn jail_attach(&self, jid: i32) -> Result<(), Errno> {
        // SAFETY: jail_attach takes a plain integer argument
        let ret = unsafe { libc::syscall(self.table.attach, jid) };
        Errno::result(ret).map(drop)
    }

    fn jail_remove(&self, jid: i32) -> Result<(), Errno> {
        // SAFETY: jail_remove takes a plain integer argument
        let ret = unsafe { libc::syscall(self.table.remove, jid) };
        Errno::result(ret).map(drop)
    }
}

#[cfg(not(target_os = "freebsd"))]
impl Kernel for Host {
    fn jail_get(&self, _buf: &mut IoBuffer<'_>, _flags: GetFlags) -> Result<i32, Errno> {
        Err(Errno::ENOSYS)
    }

    fn jail_set(&self, _buf: &mut IoBuffer<'_>, _flags: SetFlags) -> Result<i32, Errno> {
        Err(Errno::ENOSYS)
    }

    fn jail_attach(&self, _jid: i32) -> Result<(), Errno> {
        Err(Errno::ENOSYS)
    }

    fn jail_remove(&self, _jid: i32) -> Result<(), Errno> {
        Err(Errno::ENOSYS)
    }
}
