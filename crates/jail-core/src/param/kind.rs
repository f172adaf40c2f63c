//! Known jail parameters and their types

use crate::jail::Permission;
use serde::Serialize;
use std::fmt;

/// Decoded type of a jail parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    String,
    Bool,
    Int,
}

/// A parameter value fetched from the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Bool(bool),
    Int(i32),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

const STRING_PARAMS: &[&str] = &[
    "name",
    "path",
    "host.hostname",
    "host.domainname",
    "host.hostuuid",
    "osrelease",
];

const INT_PARAMS: &[&str] = &[
    "jid",
    "parent",
    "securelevel",
    "osreldate",
    "enforce_statfs",
    "devfs_ruleset",
    "children.max",
    "children.cur",
    "cpuset.id",
    "vnet",
    "ip4",
    "ip6",
];

const BOOL_PARAMS: &[&str] = &["dying", "persist", "allow.sysvipc"];

impl ParamKind {
    /// Look up the type of a known parameter
    ///
    /// Every `allow.X` toggle of [`Permission`] is a boolean.
    #[must_use]
    pub fn of(name: &str) -> Option<Self> {
        if STRING_PARAMS.contains(&name) {
            Some(Self::String)
        } else if INT_PARAMS.contains(&name) {
            Some(Self::Int)
        } else if BOOL_PARAMS.contains(&name)
            || Permission::ALL.iter().any(|p| p.allow_param() == name)
        {
            Some(Self::Bool)
        } else {
            None
        }
    }
}

/// Cut a fixed-capacity string buffer down to its contents
///
/// The kernel NUL-pads string parameters; trailing NULs are dropped.
#[must_use]
pub fn decode_string(buf: &[u8]) -> String {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
