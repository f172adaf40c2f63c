//! Jail lookup and enumeration

use crate::config::STRING_PARAM_CAPACITY;
use crate::jail::{Jail, Permission, Perms};
use crate::param::{kind::decode_string, Params};
use crate::sys::{self, GetFlags, Kernel};
use crate::{JailError, Result};

/// Look up one jail by ID
///
/// Issues one `jail_get` for every parameter every kernel knows, then one
/// for the optional permissions. A kernel that lacks an optional permission
/// leaves it off instead of failing the lookup.
pub fn find_by_id<K: Kernel + ?Sized>(kernel: &K, jid: i32) -> Result<Jail> {
    let mut name = [0u8; STRING_PARAM_CAPACITY];
    let mut path = [0u8; STRING_PARAM_CAPACITY];
    let mut hostname = [0u8; STRING_PARAM_CAPACITY];
    let mut osrelease = [0u8; STRING_PARAM_CAPACITY];
    let mut vnet = 0i32;
    let mut enforce_statfs = 0i32;
    let mut osreldate = 0i32;
    let mut securelevel = 0i32;
    let mut parent = 0i32;
    let mut dying = 0i32;
    let mut persist = 0i32;
    let mut devfs_ruleset = 0i32;

    let required: Vec<Permission> = Permission::ALL
        .into_iter()
        .filter(|p| !p.is_optional())
        .collect();
    let mut granted = vec![0i32; required.len()];

    let mut params = Params::new();
    params.add("jid", jid)?;
    params.add("name", &mut name[..])?;
    params.add("path", &mut path[..])?;
    params.add("host.hostname", &mut hostname[..])?;
    params.add("osrelease", &mut osrelease[..])?;
    params.add("vnet", &mut vnet)?;
    params.add("enforce_statfs", &mut enforce_statfs)?;
    params.add("osreldate", &mut osreldate)?;
    params.add("securelevel", &mut securelevel)?;
    params.add("parent", &mut parent)?;
    params.add("dying", &mut dying)?;
    params.add("persist", &mut persist)?;
    params.add("devfs_ruleset", &mut devfs_ruleset)?;
    for (perm, slot) in required.iter().zip(granted.iter_mut()) {
        params.add(perm.allow_param(), slot)?;
    }
    sys::get_params(kernel, params, GetFlags::DYING)?;

    let mut perms = Perms::default();
    for (perm, value) in required.iter().zip(&granted) {
        perms.set(*perm, *value != 0);
    }
    for (perm, allowed) in fetch_optional_perms(kernel, jid)? {
        perms.set(perm, allowed);
    }

    Ok(Jail {
        id: jid,
        name: decode_string(&name),
        path: decode_string(&path),
        hostname: decode_string(&hostname),
        osrelease: decode_string(&osrelease),
        osreldate,
        securelevel,
        parent,
        enforce_statfs,
        devfs_ruleset,
        // vnet is a jailsys value: 1 means a new stack, 2 inherits the parent's
        vnet: vnet == 1,
        dying: dying != 0,
        persist: persist != 0,
        perms,
    })
}

/// Whether the jail itself is still there, as opposed to one of the
/// parameters asked about being unknown
fn jail_exists<K: Kernel + ?Sized>(kernel: &K, jid: i32) -> Result<bool> {
    let params = Params::new().with("jid", jid)?;
    match sys::get_params(kernel, params, GetFlags::DYING) {
        Ok(_) => Ok(true),
        Err(JailError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Tolerate a missing optional parameter, but not a jail that went away
fn tolerate_missing<K: Kernel + ?Sized>(kernel: &K, jid: i32, err: JailError) -> Result<()> {
    if !err.is_missing_parameter() {
        return Err(err);
    }
    if matches!(err, JailError::NotFound(_)) && !jail_exists(kernel, jid)? {
        return Err(err);
    }
    Ok(())
}

/// Fetch the optional permissions, all at once when the kernel knows every
/// one of them, otherwise one by one
fn fetch_optional_perms<K: Kernel + ?Sized>(kernel: &K, jid: i32) -> Result<Vec<(Permission, bool)>> {
    let optional: Vec<Permission> = Permission::ALL
        .into_iter()
        .filter(|p| p.is_optional())
        .collect();
    let mut values = vec![0i32; optional.len()];

    let mut params = Params::new();
    params.add("jid", jid)?;
    for (perm, slot) in optional.iter().zip(values.iter_mut()) {
        params.add(perm.allow_param(), slot)?;
    }
    match sys::get_params(kernel, params, GetFlags::DYING) {
        Ok(_) => {
            return Ok(optional
                .into_iter()
                .zip(values)
                .map(|(perm, value)| (perm, value != 0))
                .collect());
        }
        Err(e) => {
            let reason = e.to_string();
            tolerate_missing(kernel, jid, e)?;
            tracing::debug!(jid, error = %reason, "falling back to per-permission lookups");
        }
    }

    let mut perms = Vec::with_capacity(optional.len());
    for perm in optional {
        let mut value = 0i32;
        let params = Params::new()
            .with("jid", jid)?
            .with(perm.allow_param(), &mut value)?;
        match sys::get_params(kernel, params, GetFlags::DYING) {
            Ok(_) => perms.push((perm, value != 0)),
            Err(e) => {
                tolerate_missing(kernel, jid, e)?;
                tracing::debug!(jid, param = perm.allow_param(), "optional parameter unavailable");
                perms.push((perm, false));
            }
        }
    }
    Ok(perms)
}

/// Iterator over the IDs of every jail the kernel knows
///
/// Walks the ID space with a `lastjid` cursor, one `jail_get` per step. The
/// walk is not a snapshot: jails created or removed meanwhile may or may not
/// show up. It ends when the kernel reports no jail past the cursor; any
/// other failure is yielded once and ends it too.
#[derive(Debug)]
pub struct Jids<'k, K: ?Sized> {
    kernel: &'k K,
    cursor: i32,
    done: bool,
}

impl<'k, K: Kernel + ?Sized> Jids<'k, K> {
    pub const fn new(kernel: &'k K) -> Self {
        Self {
            kernel,
            cursor: 0,
            done: false,
        }
    }

    fn step(&self) -> Result<i32> {
        let params = Params::new().with("jid", 0)?.with("lastjid", self.cursor)?;
        sys::get_params(self.kernel, params, GetFlags::DYING)
    }
}

impl<K: Kernel + ?Sized> Iterator for Jids<'_, K> {
    type Item = Result<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(jid) => {
                self.cursor = jid;
                Some(Ok(jid))
            }
            Err(JailError::NotFound(_)) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<K: Kernel + ?Sized> std::iter::FusedIterator for Jids<'_, K> {}

/// Every jail, living and dying
///
/// Fails as a whole if any single lookup fails, including a jail that
/// disappears between being listed and being looked up.
pub fn all<K: Kernel + ?Sized>(kernel: &K) -> Result<Vec<Jail>> {
    let jids = Jids::new(kernel).collect::<Result<Vec<_>>>()?;
    jids.into_iter().map(|jid| find_by_id(kernel, jid)).collect()
}

/// Jails that are not being removed
pub fn living<K: Kernel + ?Sized>(kernel: &K) -> Result<Vec<Jail>> {
    filter_by_dying(kernel, false)
}

/// Jails that have been removed but not yet torn down
pub fn dying<K: Kernel + ?Sized>(kernel: &K) -> Result<Vec<Jail>> {
    filter_by_dying(kernel, true)
}

/// Names of every jail, living and dying
pub fn all_names<K: Kernel + ?Sized>(kernel: &K) -> Result<Vec<String>> {
    Ok(all(kernel)?.into_iter().map(|j| j.name).collect())
}

fn filter_by_dying<K: Kernel + ?Sized>(kernel: &K, dying: bool) -> Result<Vec<Jail>> {
    let mut jails = all(kernel)?;
    jails.retain(|j| j.dying == dying);
    Ok(jails)
}
