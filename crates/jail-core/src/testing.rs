//! In-memory kernels for unit tests

use crate::jail::Permission;
use crate::param::buffer::ERRMSG_PARAM;
use crate::param::{Entry, IoBuffer};
use crate::sys::{GetFlags, Kernel, SetFlags};
use nix::errno::Errno;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

/// Longest name the fake accepts, like MAXHOSTNAMELEN
const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stored {
    Str(String),
    Int(i32),
    Raw(Vec<u8>),
}

fn read_i32(bytes: &[u8]) -> Option<i32> {
    bytes.try_into().ok().map(i32::from_ne_bytes)
}

fn read_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn find<'e, 'b>(entries: &'e [Entry<'b>], name: &str) -> Option<&'e Entry<'b>> {
    entries.iter().find(|e| e.name == name)
}

fn write_errmsg(entries: &mut [Entry<'_>], msg: &str) {
    if let Some(entry) = entries.iter_mut().find(|e| e.name == ERRMSG_PARAM) {
        let len = msg.len().min(entry.value.len().saturating_sub(1));
        entry.value[..len].copy_from_slice(&msg.as_bytes()[..len]);
        entry.value[len..].fill(0);
    }
}

fn reject(entries: &mut [Entry<'_>], msg: &str) -> Errno {
    write_errmsg(entries, msg);
    Errno::EINVAL
}

#[derive(Debug, Default)]
struct State {
    jails: BTreeMap<i32, BTreeMap<String, Stored>>,
    next_jid: i32,
    missing: HashSet<String>,
    vanish: HashSet<i32>,
    /// Jail to drop and how many more successful lookups it gets first
    countdown: Option<(i32, usize)>,
    attached: Option<i32>,
}

impl State {
    fn defaults(&self, name: &str, path: &str) -> BTreeMap<String, Stored> {
        let mut params = BTreeMap::new();
        for (key, value) in [
            ("name", name),
            ("path", path),
            ("host.hostname", name),
            ("osrelease", "14.1-RELEASE"),
        ] {
            params.insert(key.to_owned(), Stored::Str(value.to_owned()));
        }
        for (key, value) in [
            ("osreldate", 1_401_000),
            ("securelevel", -1),
            ("parent", 0),
            ("dying", 0),
            ("persist", 1),
            ("vnet", 2),
            ("enforce_statfs", 2),
            ("devfs_ruleset", 0),
            ("children.max", 0),
        ] {
            params.insert(key.to_owned(), Stored::Int(value));
        }
        for perm in Permission::ALL {
            params.insert(perm.allow_param().to_owned(), Stored::Int(0));
        }
        params.retain(|key, _| !self.missing.contains(key));
        params
    }

    fn visible(&self, jid: i32, flags: GetFlags) -> bool {
        self.jails.get(&jid).is_some_and(|params| {
            flags.contains(GetFlags::DYING) || params.get("dying") != Some(&Stored::Int(1))
        })
    }

    fn by_name(&self, name: &str) -> Option<i32> {
        self.jails
            .iter()
            .find(|(_, params)| params.get("name") == Some(&Stored::Str(name.to_owned())))
            .map(|(jid, _)| *jid)
    }

    /// Parameter updates a jail_set call asks for, checked before any is
    /// applied
    fn plan_changes(
        &self,
        entries: &[Entry<'_>],
    ) -> Result<Vec<(String, Stored)>, (Errno, Option<String>)> {
        let known = self.defaults("", "");
        let mut changes = Vec::new();
        for entry in entries {
            let name = entry.name;
            if matches!(name, "jid" | ERRMSG_PARAM) {
                continue;
            }
            if name == "ip4.addr" {
                if entry.value.len() % 4 != 0 {
                    return Err((Errno::EINVAL, Some(format!("{name}: wrong size"))));
                }
                changes.push((name.to_owned(), Stored::Raw(entry.value.to_vec())));
                continue;
            }
            if let Some(perm) = Permission::ALL.into_iter().find(|p| p.deny_param() == name) {
                if known.contains_key(perm.allow_param()) {
                    changes.push((perm.allow_param().to_owned(), Stored::Int(0)));
                    continue;
                }
            }
            match known.get(name) {
                Some(Stored::Str(_)) => {
                    let s = read_str(entry.value);
                    if s.len() > MAX_NAME_LEN {
                        return Err((Errno::ENAMETOOLONG, None));
                    }
                    changes.push((name.to_owned(), Stored::Str(s)));
                }
                Some(Stored::Int(_)) => match read_i32(entry.value) {
                    Some(n) => changes.push((name.to_owned(), Stored::Int(n))),
                    None => return Err((Errno::EINVAL, Some(format!("{name}: wrong size")))),
                },
                _ => return Err((Errno::EINVAL, Some(format!("unknown parameter: {name}")))),
            }
        }
        Ok(changes)
    }

    /// Resolve the jail a call refers to through `jid` or `name`
    fn target(&self, entries: &[Entry<'_>]) -> Option<i32> {
        let jid = find(entries, "jid").and_then(|e| read_i32(e.value)).unwrap_or(0);
        if jid > 0 {
            return self.jails.contains_key(&jid).then_some(jid);
        }
        find(entries, "name").and_then(|e| self.by_name(&read_str(e.value)))
    }
}

/// Kernel keeping jails in memory, following the jail_get/jail_set errno
/// contract
#[derive(Debug, Default)]
pub struct FakeKernel {
    state: RefCell<State>,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the kernel does not know these parameters
    pub fn without(self, params: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .missing
            .extend(params.iter().map(|p| (*p).to_owned()));
        self
    }

    /// Add a persistent jail directly, returning its jid
    pub fn insert(&self, name: &str, path: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        state.next_jid += 1;
        let jid = state.next_jid;
        let params = state.defaults(name, path);
        state.jails.insert(jid, params);
        jid
    }

    pub fn put_int(&self, jid: i32, key: &str, value: i32) {
        if let Some(params) = self.state.borrow_mut().jails.get_mut(&jid) {
            params.insert(key.to_owned(), Stored::Int(value));
        }
    }

    pub fn put_str(&self, jid: i32, key: &str, value: &str) {
        if let Some(params) = self.state.borrow_mut().jails.get_mut(&jid) {
            params.insert(key.to_owned(), Stored::Str(value.to_owned()));
        }
    }

    pub fn int(&self, jid: i32, key: &str) -> Option<i32> {
        match self.state.borrow().jails.get(&jid)?.get(key)? {
            Stored::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn raw(&self, jid: i32, key: &str) -> Option<Vec<u8>> {
        match self.state.borrow().jails.get(&jid)?.get(key)? {
            Stored::Raw(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, jid: i32) -> bool {
        self.state.borrow().jails.contains_key(&jid)
    }

    pub fn attached(&self) -> Option<i32> {
        self.state.borrow().attached
    }

    /// Drop the jail once `n` more lookups of it have succeeded
    pub fn remove_after_gets(&self, jid: i32, n: usize) {
        self.state.borrow_mut().countdown = Some((jid, n));
    }

    /// Drop the jail as soon as enumeration has reported it
    pub fn vanish_after_listing(&self, jid: i32) {
        self.state.borrow_mut().vanish.insert(jid);
    }
}

impl Kernel for FakeKernel {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, flags: GetFlags) -> Result<i32, Errno> {
        let mut state = self.state.borrow_mut();
        let mut entries = buf.entries_mut();

        if let Some(cursor) = find(&entries, "lastjid").and_then(|e| read_i32(e.value)) {
            let next = state
                .jails
                .range(cursor.saturating_add(1)..)
                .map(|(jid, _)| *jid)
                .find(|jid| state.visible(*jid, flags))
                .ok_or(Errno::ENOENT)?;
            if state.vanish.remove(&next) {
                state.jails.remove(&next);
            }
            return Ok(next);
        }

        let jid = state
            .target(&entries)
            .filter(|jid| state.visible(*jid, flags))
            .ok_or(Errno::ENOENT)?;
        let params = &state.jails[&jid];

        for idx in 0..entries.len() {
            let name = entries[idx].name;
            if matches!(name, "jid" | ERRMSG_PARAM) {
                continue;
            }
            let Some(stored) = params.get(name) else {
                let msg = format!("unknown parameter: {name}");
                return Err(reject(&mut entries, &msg));
            };
            let value = &mut *entries[idx].value;
            match stored {
                Stored::Int(n) if value.len() == size_of::<i32>() => {
                    value.copy_from_slice(&n.to_ne_bytes());
                }
                Stored::Str(s) if value.len() > s.len() => {
                    value[..s.len()].copy_from_slice(s.as_bytes());
                    value[s.len()..].fill(0);
                }
                Stored::Raw(bytes) if value.len() == bytes.len() => {
                    value.copy_from_slice(bytes);
                }
                _ => {
                    let msg = format!("{name}: wrong size");
                    return Err(reject(&mut entries, &msg));
                }
            }
        }

        if let Some((victim, left)) = state.countdown {
            if victim == jid && left <= 1 {
                state.jails.remove(&victim);
                state.countdown = None;
            } else if victim == jid {
                state.countdown = Some((victim, left - 1));
            }
        }
        Ok(jid)
    }

    fn jail_set(&self, buf: &mut IoBuffer<'_>, flags: SetFlags) -> Result<i32, Errno> {
        let mut state = self.state.borrow_mut();
        let mut entries = buf.entries_mut();

        let existing = state.target(&entries);
        if let Some(jid) = existing {
            let dying = state.jails[&jid].get("dying") == Some(&Stored::Int(1));
            if dying && !flags.contains(SetFlags::DYING) {
                return Err(Errno::ENOENT);
            }
            if !flags.contains(SetFlags::UPDATE) {
                return Err(Errno::EEXIST);
            }
        } else if !flags.contains(SetFlags::CREATE) {
            return Err(Errno::ENOENT);
        }

        let changes = match state.plan_changes(&entries) {
            Ok(changes) => changes,
            Err((errno, msg)) => {
                if let Some(msg) = msg {
                    write_errmsg(&mut entries, &msg);
                }
                return Err(errno);
            }
        };

        let jid = if let Some(jid) = existing {
            jid
        } else {
            state.next_jid += 1;
            let jid = state.next_jid;
            let mut params = state.defaults("", "");
            params.insert("persist".to_owned(), Stored::Int(0));
            state.jails.insert(jid, params);
            jid
        };
        if let Some(params) = state.jails.get_mut(&jid) {
            params.extend(changes);
        }
        if flags.contains(SetFlags::ATTACH) {
            state.attached = Some(jid);
        }
        Ok(jid)
    }

    fn jail_attach(&self, jid: i32) -> Result<(), Errno> {
        let mut state = self.state.borrow_mut();
        if !state.visible(jid, GetFlags::empty()) {
            return Err(Errno::EINVAL);
        }
        state.attached = Some(jid);
        Ok(())
    }

    fn jail_remove(&self, jid: i32) -> Result<(), Errno> {
        self.state
            .borrow_mut()
            .jails
            .remove(&jid)
            .map(drop)
            .ok_or(Errno::EINVAL)
    }
}

/// Kernel failing every call with one errno
#[derive(Debug)]
pub struct FailingKernel {
    errno: Errno,
    errmsg: Option<String>,
    calls: Cell<usize>,
}

impl FailingKernel {
    pub const fn new(errno: Errno) -> Self {
        Self {
            errno,
            errmsg: None,
            calls: Cell::new(0),
        }
    }

    /// Also leave `msg` in the errmsg parameter
    pub fn with_errmsg(mut self, msg: &str) -> Self {
        self.errmsg = Some(msg.to_owned());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn fail(&self, buf: Option<&mut IoBuffer<'_>>) -> Errno {
        self.calls.set(self.calls.get() + 1);
        if let (Some(buf), Some(msg)) = (buf, &self.errmsg) {
            write_errmsg(&mut buf.entries_mut(), msg);
        }
        self.errno
    }
}

impl Kernel for FailingKernel {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, _flags: GetFlags) -> Result<i32, Errno> {
        Err(self.fail(Some(buf)))
    }

    fn jail_set(&self, buf: &mut IoBuffer<'_>, _flags: SetFlags) -> Result<i32, Errno> {
        Err(self.fail(Some(buf)))
    }

    fn jail_attach(&self, _jid: i32) -> Result<(), Errno> {
        Err(self.fail(None))
    }

    fn jail_remove(&self, _jid: i32) -> Result<(), Errno> {
        Err(self.fail(None))
    }
}

/// Kernel answering `lastjid` walks from a fixed jid sequence
#[derive(Debug)]
pub struct ScriptedKernel {
    jids: Vec<i32>,
    cursors: RefCell<Vec<i32>>,
}

impl ScriptedKernel {
    pub fn new(jids: &[i32]) -> Self {
        Self {
            jids: jids.to_vec(),
            cursors: RefCell::new(Vec::new()),
        }
    }

    /// Every cursor the kernel was asked about, in order
    pub fn cursors(&self) -> Vec<i32> {
        self.cursors.borrow().clone()
    }
}

impl Kernel for ScriptedKernel {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, _flags: GetFlags) -> Result<i32, Errno> {
        let entries = buf.entries_mut();
        let cursor = find(&entries, "lastjid")
            .and_then(|e| read_i32(e.value))
            .ok_or(Errno::EINVAL)?;
        self.cursors.borrow_mut().push(cursor);
        let next = if cursor == 0 {
            0
        } else {
            self.jids
                .iter()
                .position(|jid| *jid == cursor)
                .map_or(self.jids.len(), |i| i + 1)
        };
        self.jids.get(next).copied().ok_or(Errno::ENOENT)
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

/// Kernel that accepts any buffer and records what it saw, unchanged
#[derive(Debug, Default)]
pub struct EchoKernel {
    seen: RefCell<Vec<(String, Vec<u8>)>>,
}

impl EchoKernel {
    pub fn seen(&self) -> Vec<(String, Vec<u8>)> {
        self.seen.borrow().clone()
    }

    fn echo(&self, buf: &mut IoBuffer<'_>) -> i32 {
        let mut seen = self.seen.borrow_mut();
        for entry in buf.entries_mut() {
            let copy = entry.value.to_vec();
            entry.value.copy_from_slice(&copy);
            seen.push((entry.name.to_owned(), copy));
        }
        0
    }
}

impl Kernel for EchoKernel {
    fn jail_get(&self, buf: &mut IoBuffer<'_>, _flags: GetFlags) -> Result<i32, Errno> {
        Ok(self.echo(buf))
    }

    fn jail_set(&self, buf: &mut IoBuffer<'_>, _flags: SetFlags) -> Result<i32, Errno> {
        Ok(self.echo(buf))
    }

    fn jail_attach(&self, _jid: i32) -> Result<(), Errno> {
        Ok(())
    }

    fn jail_remove(&self, _jid: i32) -> Result<(), Errno> {
        Ok(())
    }
}
