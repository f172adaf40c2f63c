//! Jail creation options and fixed sizes

use crate::{JailError, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Capacity of the buffers string parameters are fetched into
pub const STRING_PARAM_CAPACITY: usize = 1024;

/// Capacity of the `errmsg` buffer reserved on each get/set call
pub const ERRMSG_CAPACITY: usize = 256;

/// Options for creating a new jail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Root directory of the jail
    pub path: PathBuf,

    /// Jail name
    pub name: String,

    /// Hostname (defaults to the name)
    pub hostname: Option<String>,

    /// Single IPv4 address to restrict the jail to
    pub ip4: Option<Ipv4Addr>,

    /// Keep the jail alive without processes
    pub persist: bool,

    /// Move the calling process into the jail once created
    pub attach: bool,

    /// Change the working directory to `/` after creation
    pub chdir: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            name: String::new(),
            hostname: None,
            ip4: None,
            persist: true,
            attach: false,
            chdir: false,
        }
    }
}

impl CreateOptions {
    /// Create a new options builder
    #[must_use]
    pub fn builder() -> CreateOptionsBuilder {
        CreateOptionsBuilder::default()
    }

    /// Check that the required fields are present
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(JailError::MissingOption("path"));
        }
        if self.name.is_empty() {
            return Err(JailError::MissingOption("name"));
        }
        Ok(())
    }

    /// Hostname the jail will be given
    #[must_use]
    pub fn effective_hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.name)
    }
}

/// Builder for CreateOptions
#[derive(Debug, Default)]
pub struct CreateOptionsBuilder {
    options: CreateOptions,
}

impl CreateOptionsBuilder {
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.path = path.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.options.hostname = Some(hostname.into());
        self
    }

    #[must_use]
    pub const fn ip4(mut self, addr: Ipv4Addr) -> Self {
        self.options.ip4 = Some(addr);
        self
    }

    #[must_use]
    pub const fn persist(mut self, persist: bool) -> Self {
        self.options.persist = persist;
        self
    }

    #[must_use]
    pub const fn attach(mut self, attach: bool) -> Self {
        self.options.attach = attach;
        self
    }

    #[must_use]
    pub const fn chdir(mut self, chdir: bool) -> Self {
        self.options.chdir = chdir;
        self
    }

    #[must_use]
    pub fn build(self) -> CreateOptions {
        self.options
    }
}
