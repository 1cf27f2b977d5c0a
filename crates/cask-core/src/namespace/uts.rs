//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use cask_common::error::Result;
use cask_common::types::validate_hostname;

/// Sets the hostname inside the UTS namespace.
///
/// Only call this from a process that owns a fresh UTS namespace;
/// otherwise it renames the host.
///
/// # Errors
///
/// Returns a configuration error for an invalid hostname, or an
/// isolation error if `sethostname(2)` fails.
#[cfg(target_os = "linux")]
pub fn set_hostname(hostname: &str) -> Result<()> {
    validate_hostname(hostname)?;
    nix::unistd::sethostname(hostname).map_err(|e| cask_common::error::CaskError::Isolation {
        step: "sethostname",
        path: std::path::PathBuf::from(hostname),
        source: e.into(),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: UTS namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_hostname(hostname: &str) -> Result<()> {
    validate_hostname(hostname)?;
    Err(cask_common::error::CaskError::config(
        "Linux required for native container operations",
    ))
}
