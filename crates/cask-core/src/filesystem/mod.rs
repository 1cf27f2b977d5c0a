//! Filesystem jail for the container init.
//!
//! Entering the jail is a fixed three-step sequence, run inside the fresh
//! mount namespace before the user command replaces the init image:
//!
//! 1. mark the whole mount tree private and recursive, so nothing mounted
//!    here propagates to the host (and vice versa);
//! 2. `chroot(2)` into the rootfs and `chdir("/")`;
//! 3. mount the pseudo-filesystems of a [`MountSet`].
//!
//! Every step is fatal on failure. Mounts made before a failure die with
//! the mount namespace when the init exits.

pub mod chroot;
pub mod mount;

use std::path::{Path, PathBuf};

use cask_common::error::Result;

pub use self::mount::{MountGuard, MountSet, PseudoMount};

/// Jail rooted at one directory.
#[derive(Debug, Clone)]
pub struct FilesystemJail {
    root: PathBuf,
    mounts: MountSet,
}

impl FilesystemJail {
    /// Jail at `root` with the default `/proc` and `/dev/pts` mounts.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounts: MountSet::default(),
        }
    }

    /// Directory that becomes `/`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pseudo-filesystems mounted after the root jail.
    #[must_use]
    pub const fn mounts(&self) -> &MountSet {
        &self.mounts
    }

    /// Runs the three jail steps in order.
    ///
    /// Must only be called from a process in its own mount namespace.
    /// The returned guard unmounts the pseudo-filesystems if it is dropped,
    /// which only happens when the process image is not replaced.
    ///
    /// # Errors
    ///
    /// Returns [`cask_common::error::CaskError::Isolation`] naming the
    /// first step that failed.
    pub fn enter(&self) -> Result<MountGuard> {
        tracing::info!(root = %self.root.display(), "entering filesystem jail");
        mount::make_mounts_private()?;
        chroot::enter_root(&self.root)?;
        self.mounts.mount_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_jail_uses_default_mounts() {
        let jail = FilesystemJail::new("/srv/rootfs");
        assert_eq!(jail.root(), Path::new("/srv/rootfs"));
        assert_eq!(jail.mounts(), &MountSet::default());
    }
}
