//! Mount utilities for the container filesystem.
//!
//! Handles mount propagation and the pseudo-filesystems (`/proc`,
//! `/dev/pts`) inside the container's mount namespace.

use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags};

use cask_common::error::{CaskError, Result};

/// One pseudo-filesystem to mount inside the jail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoMount {
    /// Source passed to `mount(2)`; for pseudo-filesystems only a label.
    pub source: &'static str,
    /// Mount point inside the new root. Created when missing.
    pub target: PathBuf,
    /// Filesystem type.
    pub fstype: &'static str,
    /// Mount flags.
    pub flags: MsFlags,
    /// Filesystem-specific options.
    pub data: Option<&'static str>,
}

impl PseudoMount {
    /// Process information filesystem at `/proc`.
    #[must_use]
    pub fn proc() -> Self {
        Self {
            source: "proc",
            target: PathBuf::from("/proc"),
            fstype: "proc",
            flags: MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
            data: None,
        }
    }

    /// A private pseudo-terminal instance at `/dev/pts`.
    #[must_use]
    pub fn devpts() -> Self {
        Self {
            source: "devpts",
            target: PathBuf::from("/dev/pts"),
            fstype: "devpts",
            flags: MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
            data: Some("newinstance,ptmxmode=0666,mode=0620"),
        }
    }

    fn mount(&self) -> Result<()> {
        std::fs::create_dir_all(&self.target).map_err(|e| CaskError::Isolation {
            step: "create mount point",
            path: self.target.clone(),
            source: e,
        })?;
        nix::mount::mount(
            Some(self.source),
            &self.target,
            Some(self.fstype),
            self.flags,
            self.data,
        )
        .map_err(|e| CaskError::Isolation {
            step: "mount",
            path: self.target.clone(),
            source: e.into(),
        })?;
        tracing::debug!(target = %self.target.display(), fstype = self.fstype, "mounted");
        Ok(())
    }
}

/// Ordered pseudo-filesystems mounted after the root jail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSet {
    mounts: Vec<PseudoMount>,
}

impl MountSet {
    /// A set mounting `mounts` in the given order.
    #[must_use]
    pub const fn new(mounts: Vec<PseudoMount>) -> Self {
        Self { mounts }
    }

    /// Mounts in order.
    pub fn iter(&self) -> impl Iterator<Item = &PseudoMount> {
        self.mounts.iter()
    }

    /// Mounts every entry, relative to the current root.
    ///
    /// Stops at the first failure; entries mounted before it are detached
    /// again when the partial guard drops.
    ///
    /// # Errors
    ///
    /// Returns an isolation error for the first mount point that could
    /// not be created or mounted.
    pub fn mount_all(&self) -> Result<MountGuard> {
        let mut guard = MountGuard::default();
        for entry in self.iter() {
            entry.mount()?;
            guard.mounted.push(entry.target.clone());
        }
        Ok(guard)
    }
}

impl Default for MountSet {
    /// `/proc`, then `/dev/pts`.
    fn default() -> Self {
        Self::new(vec![PseudoMount::proc(), PseudoMount::devpts()])
    }
}

/// Pseudo-filesystems mounted by [`MountSet::mount_all`].
///
/// Dropping the guard lazily detaches them in reverse order. A successful
/// exec of the user command never drops it.
#[derive(Debug, Default)]
pub struct MountGuard {
    mounted: Vec<PathBuf>,
}

impl MountGuard {
    /// Mount points currently held.
    #[must_use]
    pub fn targets(&self) -> &[PathBuf] {
        &self.mounted
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        while let Some(target) = self.mounted.pop() {
            if let Err(e) = nix::mount::umount2(&target, MntFlags::MNT_DETACH) {
                tracing::warn!(target = %target.display(), error = %e, "failed to detach mount");
            }
        }
    }
}

/// Marks every mount, recursively, as private.
///
/// # Errors
///
/// Returns an isolation error if the propagation change fails.
pub fn make_mounts_private() -> Result<()> {
    let root = Path::new("/");
    nix::mount::mount(
        None::<&str>,
        root,
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| CaskError::Isolation {
        step: "make mounts private",
        path: root.to_path_buf(),
        source: e.into(),
    })?;
    tracing::debug!("mount propagation set to private");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_mounts_proc_before_devpts() {
        let set = MountSet::default();
        let targets: Vec<_> = set.iter().map(|m| m.target.clone()).collect();
        assert_eq!(targets, [PathBuf::from("/proc"), PathBuf::from("/dev/pts")]);
        let types: Vec<_> = set.iter().map(|m| m.fstype).collect();
        assert_eq!(types, ["proc", "devpts"]);
    }

    #[test]
    fn proc_is_not_executable() {
        let proc = PseudoMount::proc();
        assert!(proc.flags.contains(MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID));
    }

    #[test]
    fn empty_set_mounts_nothing() {
        let guard = MountSet::new(vec![]).mount_all().expect("nothing to mount");
        assert!(guard.targets().is_empty());
    }
}
