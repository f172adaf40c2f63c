//! # jail-core
//!
//! FreeBSD jail management through the `jail_get(2)` / `jail_set(2)` family.
//!
//! This crate provides:
//! - Typed jail parameters marshaled into iovec name/value arrays
//! - Thin syscall bindings behind the [`Kernel`] trait
//! - Lookup and enumeration of living and dying jails
//! - Creation, attachment and removal of jails

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod jail;
pub mod jails;
pub mod param;
pub mod query;
pub mod sys;

#[cfg(test)]
mod testing;

pub use config::CreateOptions;
pub use error::JailError;
pub use jail::{Jail, Permission, Perms};
pub use jails::Jails;
pub use param::{OutRef, Params, Value};
pub use sys::{GetFlags, Host, Kernel, SetFlags};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, JailError>;
