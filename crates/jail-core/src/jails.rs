//! High-level jail operations

use crate::config::{CreateOptions, STRING_PARAM_CAPACITY};
use crate::jail::{Jail, Permission};
use crate::param::{kind::decode_string, ParamKind, ParamValue, Params, Value};
use crate::query::{self, Jids};
use crate::sys::{self, GetFlags, Host, Kernel, SetFlags};
use crate::{JailError, Result};
use std::path::Path;

/// Entry point for creating, inspecting and removing jails
///
/// Generic over the [`Kernel`] so the same operations run against the host
/// or any other backend. No state is kept between calls.
#[derive(Debug, Clone, Default)]
pub struct Jails<K = Host> {
    kernel: K,
}

impl Jails<Host> {
    /// Operate on the running kernel
    #[must_use]
    pub const fn host() -> Self {
        Self { kernel: Host::new() }
    }
}

impl<K: Kernel> Jails<K> {
    pub const fn with_kernel(kernel: K) -> Self {
        Self { kernel }
    }

    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Look up one jail by ID
    pub fn find_by_id(&self, jid: i32) -> Result<Jail> {
        query::find_by_id(&self.kernel, jid)
    }

    /// Lazily walk the IDs of every known jail
    pub const fn jids(&self) -> Jids<'_, K> {
        Jids::new(&self.kernel)
    }

    /// Every jail, living and dying
    pub fn all(&self) -> Result<Vec<Jail>> {
        query::all(&self.kernel)
    }

    pub fn living(&self) -> Result<Vec<Jail>> {
        query::living(&self.kernel)
    }

    pub fn dying(&self) -> Result<Vec<Jail>> {
        query::dying(&self.kernel)
    }

    pub fn all_names(&self) -> Result<Vec<String>> {
        query::all_names(&self.kernel)
    }

    /// Issue jail_get(2) with arbitrary parameters
    pub fn get(&self, params: Params<'_>, flags: GetFlags) -> Result<i32> {
        sys::get_params(&self.kernel, params, flags)
    }

    /// Issue jail_set(2) with arbitrary parameters
    pub fn set(&self, params: Params<'_>, flags: SetFlags) -> Result<i32> {
        sys::set_params(&self.kernel, params, flags)
    }

    /// Create a jail, returning its ID
    ///
    /// With `attach` set the calling process is moved into the new jail by
    /// the same call; `chdir` then resets the working directory to its root.
    pub fn create(&self, opts: &CreateOptions) -> Result<i32> {
        opts.validate()?;

        let mut params = Params::new();
        params.add("path", opts.path.as_path())?;
        params.add("name", opts.name.as_str())?;
        params.add("host.hostname", opts.effective_hostname())?;
        if let Some(addr) = opts.ip4 {
            params.add("ip4.addr", addr)?;
        }
        if opts.persist {
            params.add("persist", true)?;
        }

        let mut flags = SetFlags::CREATE;
        if opts.attach {
            flags |= SetFlags::ATTACH;
        }
        let jid = self.set(params, flags)?;
        tracing::info!(jid, name = %opts.name, path = ?opts.path, "jail created");

        if opts.chdir {
            nix::unistd::chdir("/")?;
        }
        Ok(jid)
    }

    /// Create a persistent jail rooted at `path` and look it up
    pub fn create_at(&self, path: impl AsRef<Path>) -> Result<Jail> {
        let params = Params::new()
            .with("path", path.as_ref())?
            .with("persist", true)?;
        let jid = self.set(params, SetFlags::CREATE)?;
        tracing::info!(jid, path = ?path.as_ref(), "jail created");
        self.find_by_id(jid)
    }

    /// Move the calling process into the jail
    pub fn attach(&self, jid: i32) -> Result<()> {
        sys::attach(&self.kernel, jid)
    }

    /// Remove the jail, killing every process in it
    pub fn remove(&self, jid: i32) -> Result<()> {
        sys::remove(&self.kernel, jid)?;
        tracing::info!(jid, "jail removed");
        Ok(())
    }

    pub fn get_string(&self, jid: i32, name: &str) -> Result<String> {
        let mut buf = [0u8; STRING_PARAM_CAPACITY];
        let params = Params::new().with("jid", jid)?.with(name, &mut buf[..])?;
        self.get(params, GetFlags::DYING)?;
        Ok(decode_string(&buf))
    }

    pub fn get_i32(&self, jid: i32, name: &str) -> Result<i32> {
        let mut value = 0i32;
        let params = Params::new().with("jid", jid)?.with(name, &mut value)?;
        self.get(params, GetFlags::DYING)?;
        Ok(value)
    }

    pub fn get_bool(&self, jid: i32, name: &str) -> Result<bool> {
        let mut value = false;
        let params = Params::new().with("jid", jid)?.with(name, &mut value)?;
        self.get(params, GetFlags::DYING)?;
        Ok(value)
    }

    /// Fetch a parameter whose type is known from its name
    ///
    /// Fails with `UnsupportedValueType` for names outside the table in
    /// [`ParamKind::of`].
    pub fn get_any(&self, jid: i32, name: &str) -> Result<ParamValue> {
        match ParamKind::of(name) {
            Some(ParamKind::String) => self.get_string(jid, name).map(ParamValue::String),
            Some(ParamKind::Bool) => self.get_bool(jid, name).map(ParamValue::Bool),
            Some(ParamKind::Int) => self.get_i32(jid, name).map(ParamValue::Int),
            None => Err(JailError::UnsupportedValueType(name.to_owned())),
        }
    }

    /// Update one parameter of an existing jail
    pub fn set_param<'v>(&self, jid: i32, name: &str, value: impl Into<Value<'v>>) -> Result<()> {
        let params = Params::new().with("jid", jid)?.with(name, value)?;
        self.set(params, SetFlags::UPDATE)?;
        Ok(())
    }

    pub fn set_name(&self, jid: i32, name: &str) -> Result<()> {
        self.set_param(jid, "name", name)
    }

    pub fn set_hostname(&self, jid: i32, hostname: &str) -> Result<()> {
        self.set_param(jid, "host.hostname", hostname)
    }

    pub fn set_secure_level(&self, jid: i32, level: i32) -> Result<()> {
        self.set_param(jid, "securelevel", level)
    }

    /// Grant a permission
    pub fn allow(&self, jid: i32, perm: Permission) -> Result<()> {
        self.set_param(jid, perm.allow_param(), 1i32)
    }

    /// Revoke a permission
    pub fn deny(&self, jid: i32, perm: Permission) -> Result<()> {
        self.set_param(jid, perm.deny_param(), 1i32)
    }
}

impl Jail {
    /// Re-read this jail from the kernel
    pub fn refresh<K: Kernel>(&self, jails: &Jails<K>) -> Result<Self> {
        jails.find_by_id(self.id)
    }
}
