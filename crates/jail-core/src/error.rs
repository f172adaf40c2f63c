//! Error types for jail-core

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JailError {
    #[error("key {0:?} already set")]
    DuplicateKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("unsupported value type for parameter {0:?}")]
    UnsupportedValueType(String),

    /// Rejected while encoding (`errno` is `None`) or by the kernel with
    /// `EINVAL`, in which case `detail` is the kernel's own message
    #[error("invalid parameter: {detail}")]
    InvalidParameter { detail: String, errno: Option<Errno> },

    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    #[error("fault outside of allocated space")]
    OutOfBounds,

    /// Carries the raw code: `ENOENT` from `jail_get`, `EINVAL` from
    /// `jail_attach`/`jail_remove`
    #[error("jail referred to either does not exist or is inaccessible")]
    NotFound(Errno),

    #[error("permission denied")]
    PermissionDenied,

    #[error("jail already exists and the update flag is not set")]
    UpdateFlagRequired,

    #[error("string parameter is longer than allowed")]
    NameTooLong,

    #[error("no free jail ID found")]
    IdentifierSpaceExhausted,

    #[error("unprivileged user")]
    UnprivilegedCaller,

    #[error("syscall failed: {0}")]
    SyscallFailed(#[from] Errno),
}

impl JailError {
    /// Parameter rejected before any syscall was made
    #[must_use]
    pub fn invalid_parameter(name: impl Into<String>) -> Self {
        Self::InvalidParameter {
            detail: name.into(),
            errno: None,
        }
    }

    /// The errno the kernel returned, `None` for errors raised before any
    /// syscall was made
    #[must_use]
    pub const fn errno(&self) -> Option<Errno> {
        match self {
            Self::OutOfBounds => Some(Errno::EFAULT),
            Self::NotFound(errno) => Some(*errno),
            Self::InvalidParameter { errno, .. } => *errno,
            Self::PermissionDenied | Self::UnprivilegedCaller => Some(Errno::EPERM),
            Self::UpdateFlagRequired => Some(Errno::EEXIST),
            Self::NameTooLong => Some(Errno::ENAMETOOLONG),
            Self::IdentifierSpaceExhausted => Some(Errno::EAGAIN),
            Self::SyscallFailed(errno) => Some(*errno),
            Self::DuplicateKey(_)
            | Self::InvalidValue(_)
            | Self::UnsupportedValueType(_)
            | Self::MissingOption(_) => None,
        }
    }

    /// Whether a query for an optional parameter may ignore this error.
    #[must_use]
    pub const fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidParameter { .. })
    }
}
