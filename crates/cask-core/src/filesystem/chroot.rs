//! Root jail via `chroot(2)`.

use std::path::{Path, PathBuf};

use cask_common::error::{CaskError, Result};

/// Changes the filesystem root to `new_root`, then the working directory
/// to the new `/`.
///
/// Both calls must succeed: a process whose root moved but whose working
/// directory still points outside it can walk back out of the jail.
///
/// # Errors
///
/// Returns an isolation error naming the failed call.
pub fn enter_root(new_root: &Path) -> Result<()> {
    nix::unistd::chroot(new_root).map_err(|e| CaskError::Isolation {
        step: "chroot",
        path: new_root.to_path_buf(),
        source: e.into(),
    })?;
    nix::unistd::chdir("/").map_err(|e| CaskError::Isolation {
        step: "chdir",
        path: PathBuf::from("/"),
        source: e.into(),
    })?;
    tracing::debug!(root = %new_root.display(), "root jail entered");
    Ok(())
}
