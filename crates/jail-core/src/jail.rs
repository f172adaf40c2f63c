//! Jail descriptors

use serde::Serialize;

/// Snapshot of one jail as reported by the kernel
///
/// Only built by querying the kernel. It is not kept in sync afterwards, and
/// dropping it has no effect on the jail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Jail {
    /// Kernel-assigned jail ID
    pub id: i32,
    pub name: String,
    /// Root directory
    pub path: String,
    pub hostname: String,
    pub osrelease: String,
    pub osreldate: i32,
    pub securelevel: i32,
    /// jid of the parent jail, 0 for the host
    pub parent: i32,
    pub enforce_statfs: i32,
    pub devfs_ruleset: i32,
    /// Has its own virtual network stack
    pub vnet: bool,
    /// Removed but not yet torn down
    pub dying: bool,
    pub persist: bool,
    pub perms: Perms,
}

/// Permission toggles of a jail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Perms {
    pub allow_set_hostname: bool,
    pub allow_extattr: bool,
    pub allow_reserved_ports: bool,
    pub allow_set_time: bool,
    pub allow_suser: bool,
    pub allow_chflags: bool,
    pub allow_raw_sockets: bool,
    pub allow_mount: bool,
    pub allow_mount_devfs: bool,
    pub allow_mount_procfs: bool,
    pub allow_mount_tmpfs: bool,
    pub allow_mount_nullfs: bool,
    pub allow_mount_zfs: bool,
    pub allow_mlock: bool,
    pub allow_read_msgbuf: bool,
    pub allow_socket_af: bool,
    pub allow_quotas: bool,
    pub allow_adjtime: bool,
    pub allow_routing: bool,
    pub allow_setaudit: bool,
    pub allow_unprivileged_proc_debug: bool,
    pub allow_unprivileged_parent_tampering: bool,
    pub allow_vmm: bool,
}

/// A single `allow.*` permission
///
/// The kernel exposes each one as two boolean parameters: `allow.X` to grant
/// it and `allow.noX` to revoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// sethostname(3)
    SetHostname,
    /// Extended attributes
    Extattr,
    /// Binding to ports below 1024
    ReservedPorts,
    /// Setting the global clock
    SetTime,
    /// root acts as superuser
    Suser,
    /// chflags(2)
    Chflags,
    RawSockets,
    /// Mounting jail-friendly filesystems
    Mount,
    MountDevfs,
    MountProcfs,
    MountTmpfs,
    MountNullfs,
    MountZfs,
    /// mlock(2)
    Mlock,
    /// Reading the kernel message buffer
    ReadMsgbuf,
    /// Socket address families beyond inet, inet6, local and route
    SocketAf,
    Quotas,
    /// adjtime(2)
    AdjTime,
    /// Modifying the routing table
    Routing,
    /// Setting audit session state
    SetAudit,
    UnprivilegedProcDebug,
    UnprivilegedParentTampering,
    Vmm,
}

impl Permission {
    pub const ALL: [Self; 23] = [
        Self::SetHostname,
        Self::Extattr,
        Self::ReservedPorts,
        Self::SetTime,
        Self::Suser,
        Self::Chflags,
        Self::RawSockets,
        Self::Mount,
        Self::MountDevfs,
        Self::MountProcfs,
        Self::MountTmpfs,
        Self::MountNullfs,
        Self::MountZfs,
        Self::Mlock,
        Self::ReadMsgbuf,
        Self::SocketAf,
        Self::Quotas,
        Self::AdjTime,
        Self::Routing,
        Self::SetAudit,
        Self::UnprivilegedProcDebug,
        Self::UnprivilegedParentTampering,
        Self::Vmm,
    ];

    /// `(allow.X, allow.noX)` parameter names
    const fn params(self) -> (&'static str, &'static str) {
        match self {
            Self::SetHostname => ("allow.set_hostname", "allow.noset_hostname"),
            Self::Extattr => ("allow.extattr", "allow.noextattr"),
            Self::ReservedPorts => ("allow.reserved_ports", "allow.noreserved_ports"),
            Self::SetTime => ("allow.settime", "allow.nosettime"),
            Self::Suser => ("allow.suser", "allow.nosuser"),
            Self::Chflags => ("allow.chflags", "allow.nochflags"),
            Self::RawSockets => ("allow.raw_sockets", "allow.noraw_sockets"),
            Self::Mount => ("allow.mount", "allow.nomount"),
            Self::MountDevfs => ("allow.mount.devfs", "allow.nomount.devfs"),
            Self::MountProcfs => ("allow.mount.procfs", "allow.nomount.procfs"),
            Self::MountTmpfs => ("allow.mount.tmpfs", "allow.nomount.tmpfs"),
            Self::MountNullfs => ("allow.mount.nullfs", "allow.nomount.nullfs"),
            Self::MountZfs => ("allow.mount.zfs", "allow.nomount.zfs"),
            Self::Mlock => ("allow.mlock", "allow.nomlock"),
            Self::ReadMsgbuf => ("allow.read_msgbuf", "allow.noread_msgbuf"),
            Self::SocketAf => ("allow.socket_af", "allow.nosocket_af"),
            Self::Quotas => ("allow.quotas", "allow.noquotas"),
            Self::AdjTime => ("allow.adjtime", "allow.noadjtime"),
            Self::Routing => ("allow.routing", "allow.norouting"),
            Self::SetAudit => ("allow.setaudit", "allow.nosetaudit"),
            Self::UnprivilegedProcDebug => (
                "allow.unprivileged_proc_debug",
                "allow.nounprivileged_proc_debug",
            ),
            Self::UnprivilegedParentTampering => (
                "allow.unprivileged_parent_tampering",
                "allow.nounprivileged_parent_tampering",
            ),
            Self::Vmm => ("allow.vmm", "allow.novmm"),
        }
    }

    /// Parameter that grants the permission
    #[must_use]
    pub const fn allow_param(self) -> &'static str {
        self.params().0
    }

    /// Parameter that revokes the permission
    #[must_use]
    pub const fn deny_param(self) -> &'static str {
        self.params().1
    }

    /// Whether the parameter depends on kernel version or loaded modules
    ///
    /// Querying an optional permission on a kernel that lacks it is not an
    /// error; the permission simply reads as off.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        !matches!(
            self,
            Self::SetHostname
                | Self::Suser
                | Self::Chflags
                | Self::RawSockets
                | Self::Mount
                | Self::SocketAf
                | Self::Quotas
        )
    }
}

impl Perms {
    #[must_use]
    pub const fn get(&self, perm: Permission) -> bool {
        match perm {
            Permission::SetHostname => self.allow_set_hostname,
            Permission::Extattr => self.allow_extattr,
            Permission::ReservedPorts => self.allow_reserved_ports,
            Permission::SetTime => self.allow_set_time,
            Permission::Suser => self.allow_suser,
            Permission::Chflags => self.allow_chflags,
            Permission::RawSockets => self.allow_raw_sockets,
            Permission::Mount => self.allow_mount,
            Permission::MountDevfs => self.allow_mount_devfs,
            Permission::MountProcfs => self.allow_mount_procfs,
            Permission::MountTmpfs => self.allow_mount_tmpfs,
            Permission::MountNullfs => self.allow_mount_nullfs,
            Permission::MountZfs => self.allow_mount_zfs,
            Permission::Mlock => self.allow_mlock,
            Permission::ReadMsgbuf => self.allow_read_msgbuf,
            Permission::SocketAf => self.allow_socket_af,
            Permission::Quotas => self.allow_quotas,
            Permission::AdjTime => self.allow_adjtime,
            Permission::Routing => self.allow_routing,
            Permission::SetAudit => self.allow_setaudit,
            Permission::UnprivilegedProcDebug => self.allow_unprivileged_proc_debug,
            Permission::UnprivilegedParentTampering => self.allow_unprivileged_parent_tampering,
            Permission::Vmm => self.allow_vmm,
        }
    }

    pub fn set(&mut self, perm: Permission, allowed: bool) {
        let field = match perm {
            Permission::SetHostname => &mut self.allow_set_hostname,
            Permission::Extattr => &mut self.allow_extattr,
            Permission::ReservedPorts => &mut self.allow_reserved_ports,
            Permission::SetTime => &mut self.allow_set_time,
            Permission::Suser => &mut self.allow_suser,
            Permission::Chflags => &mut self.allow_chflags,
            Permission::RawSockets => &mut self.allow_raw_sockets,
            Permission::Mount => &mut self.allow_mount,
            Permission::MountDevfs => &mut self.allow_mount_devfs,
            Permission::MountProcfs => &mut self.allow_mount_procfs,
            Permission::MountTmpfs => &mut self.allow_mount_tmpfs,
            Permission::MountNullfs => &mut self.allow_mount_nullfs,
            Permission::MountZfs => &mut self.allow_mount_zfs,
            Permission::Mlock => &mut self.allow_mlock,
            Permission::ReadMsgbuf => &mut self.allow_read_msgbuf,
            Permission::SocketAf => &mut self.allow_socket_af,
            Permission::Quotas => &mut self.allow_quotas,
            Permission::AdjTime => &mut self.allow_adjtime,
            Permission::Routing => &mut self.allow_routing,
            Permission::SetAudit => &mut self.allow_setaudit,
            Permission::UnprivilegedProcDebug => &mut self.allow_unprivileged_proc_debug,
            Permission::UnprivilegedParentTampering => {
                &mut self.allow_unprivileged_parent_tampering
            }
            Permission::Vmm => &mut self.allow_vmm,
        };
        *field = allowed;
    }
}
