//! Cgroups v2 resource management.
//!
//! One group per container run lives at `<root>/<parent>/<id>`. Creation
//! joins the calling process to the group (so the container init inherits
//! membership) and then writes the requested limits. Any failure after the
//! directory exists removes it again before the error is returned.

pub mod cpu;
pub mod memory;

#[cfg(test)]
pub(crate) mod scratch;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cask_common::config::RuntimeConfig;
use cask_common::error::{CaskError, Result};
use cask_common::types::{ContainerId, ResourceLimits};

/// Process membership file.
pub const PROCS_FILE: &str = "cgroup.procs";

/// Controller delegation file.
pub const SUBTREE_CONTROL_FILE: &str = "cgroup.subtree_control";

/// The filesystem effects the resource controller performs.
///
/// [`HostControlFs`] talks to the real cgroup v2 hierarchy. Other
/// implementations exist to inject failures in tests.
pub trait ControlFs: fmt::Debug + Send + Sync {
    /// Creates `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Creates `path`, failing if it already exists.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Writes `value` to the control file at `file`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn write(&self, file: &Path, value: &str) -> io::Result<()>;

    /// Removes the group directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Cgroup v2 filesystem: control files are written in place and a group
/// is removed with `rmdir(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostControlFs;

impl ControlFs for HostControlFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn write(&self, file: &Path, value: &str) -> io::Result<()> {
        std::fs::write(file, value)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}

/// Handle to the cgroup owned by one container run.
#[derive(Debug)]
pub struct CgroupHandle {
    id: ContainerId,
    path: PathBuf,
    /// Group the orchestrator belonged to before joining, when it lies
    /// under the configured root.
    origin: Option<PathBuf>,
    fs: Arc<dyn ControlFs>,
}

impl CgroupHandle {
    /// Creates and configures the cgroup for `id` on the host hierarchy.
    ///
    /// # Errors
    ///
    /// See [`CgroupHandle::create_with`].
    pub fn create(config: &RuntimeConfig, id: &ContainerId, limits: &ResourceLimits) -> Result<Self> {
        Self::create_with(Arc::new(HostControlFs), config, id, limits)
    }

    /// Creates the group directory, joins the calling process to it, and
    /// applies `limits`.
    ///
    /// The directory must not exist yet. If joining or any limit write
    /// fails, the calling process is moved back out, the directory is
    /// removed, and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Cgroup`] for any directory or control-file
    /// failure.
    pub fn create_with(
        fs: Arc<dyn ControlFs>,
        config: &RuntimeConfig,
        id: &ContainerId,
        limits: &ResourceLimits,
    ) -> Result<Self> {
        let base = config.cgroup_base();
        let path = base.join(id.as_str());
        let wrap = |path: &Path, source: io::Error| CaskError::Cgroup {
            id: id.to_string(),
            path: path.to_path_buf(),
            source,
        };

        fs.create_dir_all(&base).map_err(|e| wrap(&base, e))?;
        delegate_controllers(fs.as_ref(), config, limits);
        fs.create_dir(&path).map_err(|e| wrap(&path, e))?;
        tracing::info!(id = %id, path = %path.display(), "cgroup created");

        let handle = Self {
            id: id.clone(),
            origin: current_origin(&config.cgroup_root).filter(|o| *o != path),
            path,
            fs,
        };
        if let Err(err) = handle.configure(limits) {
            handle.rollback();
            return Err(err);
        }
        Ok(handle)
    }

    /// Refers to an existing group by identifier without touching it.
    ///
    /// Used to reclaim groups leaked by an earlier run.
    #[must_use]
    pub fn open(config: &RuntimeConfig, id: &ContainerId) -> Self {
        Self {
            id: id.clone(),
            path: config.cgroup_base().join(id.as_str()),
            origin: None,
            fs: Arc::new(HostControlFs),
        }
    }

    /// Container this group belongs to.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Directory of this group.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure(&self, limits: &ResourceLimits) -> Result<()> {
        self.add_process(std::process::id())?;
        if let Some(weight) = limits.cpu_weight.filter(|w| *w > 0) {
            cpu::set_cpu_weight(self, weight)?;
        }
        if let Some(quota) = limits.cpu_quota {
            cpu::set_cpu_max(self, quota)?;
        }
        if let Some(bytes) = limits.memory_bytes.filter(|b| *b > 0) {
            memory::set_memory_max(self, bytes)?;
        }
        Ok(())
    }

    /// Adds a process to this group by writing its PID.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `cgroup.procs` fails.
    pub fn add_process(&self, pid: u32) -> Result<()> {
        self.write_control(PROCS_FILE, &pid.to_string())?;
        tracing::debug!(id = %self.id, pid, "added process to cgroup");
        Ok(())
    }

    /// Moves the calling process back to the group it came from.
    ///
    /// Called once the container init exists, and again before removal:
    /// a group that still holds the orchestrator cannot be removed. Does
    /// nothing when the origin group is unknown.
    pub fn release_self(&self) {
        let Some(origin) = &self.origin else {
            return;
        };
        let file = origin.join(PROCS_FILE);
        let pid = std::process::id();
        match self.fs.write(&file, &pid.to_string()) {
            Ok(()) => tracing::debug!(id = %self.id, pid, origin = %origin.display(), "left cgroup"),
            Err(e) => tracing::warn!(
                id = %self.id,
                pid,
                origin = %origin.display(),
                error = %e,
                "could not move orchestrator out of cgroup"
            ),
        }
    }

    /// Removes the group directory.
    ///
    /// An already-absent directory counts as success, so calling this
    /// twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Cgroup`] if the directory exists but cannot be
    /// removed, typically because processes are still members.
    pub fn cleanup(&self) -> Result<()> {
        self.release_self();
        match self.fs.remove_dir(&self.path) {
            Ok(()) => {
                tracing::info!(id = %self.id, path = %self.path.display(), "cgroup removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(id = %self.id, path = %self.path.display(), "cgroup already absent");
                Ok(())
            }
            Err(e) => Err(CaskError::Cgroup {
                id: self.id.to_string(),
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn rollback(&self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!(id = %self.id, error = %e, "cgroup rollback left a directory behind");
        }
    }

    pub(crate) fn write_control(&self, file_name: &str, value: &str) -> Result<()> {
        let file = self.path.join(file_name);
        self.fs.write(&file, value).map_err(|e| CaskError::Cgroup {
            id: self.id.to_string(),
            path: file,
            source: e,
        })
    }
}

/// Enables the controllers `limits` needs on every level between the
/// cgroup root and the container groups. Best effort: a controller that
/// is already enabled or unavailable shows up later as a limit write error.
fn delegate_controllers(fs: &dyn ControlFs, config: &RuntimeConfig, limits: &ResourceLimits) {
    let mut controllers = Vec::new();
    if limits.cpu_weight.is_some_and(|w| w > 0) || limits.cpu_quota.is_some() {
        controllers.push("+cpu");
    }
    if limits.memory_bytes.is_some_and(|b| b > 0) {
        controllers.push("+memory");
    }
    if controllers.is_empty() {
        return;
    }

    let mut level = config.cgroup_root.clone();
    let mut levels = vec![level.clone()];
    for component in Path::new(&config.cgroup_parent).components() {
        level.push(component);
        levels.push(level.clone());
    }

    for level in &levels {
        let file = level.join(SUBTREE_CONTROL_FILE);
        for controller in &controllers {
            if let Err(e) = fs.write(&file, controller) {
                tracing::debug!(file = %file.display(), controller, error = %e, "controller not delegated");
            }
        }
    }
}

/// Resolves the calling process's current cgroup v2 group under `root`.
fn current_origin(root: &Path) -> Option<PathBuf> {
    let raw = std::fs::read_to_string("/proc/self/cgroup").ok()?;
    let relative = raw.lines().find_map(|line| line.strip_prefix("0::"))?;
    let origin = root.join(relative.trim().trim_start_matches('/'));
    origin.join(PROCS_FILE).is_file().then_some(origin)
}
