//! Syscall numbers and call flags (from sys/jail.h and syscalls.master)

use bitflags::bitflags;
use libc::c_int;

/// Syscall numbers of the jail entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallTable {
    /// Legacy `jail(2)`; creation goes through `jail_set` instead
    pub jail: c_int,
    pub attach: c_int,
    pub get: c_int,
    pub set: c_int,
    pub remove: c_int,
}

/// FreeBSD syscall numbers
pub const FREEBSD: SyscallTable = SyscallTable {
    jail: 338,
    attach: 436,
    get: 506,
    set: 507,
    remove: 508,
};

bitflags! {
    /// Flags accepted by `jail_set(2)`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetFlags: c_int {
        /// Create a new jail. If a jid or name parameter exists, it must not
        /// refer to an existing jail.
        const CREATE = 0x01;
        /// Modify an existing jail. Combined with CREATE, the jail is created
        /// when absent and modified otherwise.
        const UPDATE = 0x02;
        /// Also attach the calling process to the jail.
        const ATTACH = 0x04;
        /// Allow touching a jail that is being removed.
        const DYING = 0x08;
    }
}

bitflags! {
    /// Flags accepted by `jail_get(2)`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GetFlags: c_int {
        /// Allow getting a jail that is being removed.
        const DYING = 0x08;
    }
}
