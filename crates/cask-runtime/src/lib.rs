//! Two-stage container launch for the cask runtime.
//!
//! The orchestration stage ([`engine`]) creates the cgroup, clones the
//! container init with fresh namespaces ([`bootstrap`]) and waits for it.
//! The init stage ([`init`]) runs inside those namespaces: it reads its
//! configuration from the argument vector ([`protocol`]), jails itself and
//! replaces its image with the user command.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

#[cfg(target_os = "linux")]
pub mod bootstrap;
#[cfg(target_os = "linux")]
pub mod engine;
#[cfg(target_os = "linux")]
pub mod init;
pub mod protocol;
#[cfg(target_os = "linux")]
pub mod signal;
pub mod status;
