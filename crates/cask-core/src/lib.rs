//! # cask-core
//!
//! Low-level Linux isolation primitives for the cask runtime.
//!
//! This crate provides safe abstractions over:
//! - **Cgroups v2**: per-container groups with CPU weight, CPU quota and
//!   memory ceilings, created with strict rollback.
//! - **Namespaces**: the set of isolation domains requested when the
//!   container init is cloned, and hostname assignment.
//! - **Filesystem**: private mount propagation, the root jail, and the
//!   pseudo-filesystems mounted inside it.
//!
//! The namespace and filesystem operations are only meaningful inside the
//! isolated child; nothing here applies them to the calling process unless
//! asked to.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
#[cfg(target_os = "linux")]
pub mod filesystem;
pub mod namespace;
