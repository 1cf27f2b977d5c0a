//! Process-wide runtime configuration.
//!
//! Holds the values that would otherwise be hard-coded globals: where the
//! cgroup v2 hierarchy is mounted, which sub-directory of it belongs to
//! cask, and which binary is re-executed as the container init. Tests point
//! `cgroup_root` at a scratch directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    CGROUP_V2_PATH, DEFAULT_CGROUP_PARENT, ENV_CGROUP_PARENT, ENV_CGROUP_ROOT, ENV_SELF_EXE,
};
use crate::error::{CaskError, Result};

/// Root configuration for the cask runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Mount point of the cgroup v2 unified hierarchy.
    pub cgroup_root: PathBuf,
    /// Directory below `cgroup_root` that holds one group per container.
    pub cgroup_parent: String,
    /// Binary re-executed as the container init. `None` means the
    /// currently running executable.
    pub self_exe: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from(CGROUP_V2_PATH),
            cgroup_parent: DEFAULT_CGROUP_PARENT.to_owned(),
            self_exe: None,
        }
    }
}

impl RuntimeConfig {
    /// Loads a configuration from a JSON file. Missing fields keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CaskError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `CASK_CGROUP_ROOT`, `CASK_CGROUP_PARENT` and `CASK_SELF_EXE`
    /// overrides from the environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var_os(key))
    }

    /// Applies overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        if let Some(root) = lookup(ENV_CGROUP_ROOT).filter(|v| !v.is_empty()) {
            self.cgroup_root = PathBuf::from(root);
        }
        if let Some(parent) = lookup(ENV_CGROUP_PARENT).filter(|v| !v.is_empty()) {
            self.cgroup_parent = parent.to_string_lossy().into_owned();
        }
        if let Some(exe) = lookup(ENV_SELF_EXE).filter(|v| !v.is_empty()) {
            self.self_exe = Some(PathBuf::from(exe));
        }
        self
    }

    /// Checks that the cgroup parent is a plain relative path.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `cgroup_parent` is empty, absolute,
    /// or climbs out of the cgroup root.
    pub fn validate(&self) -> Result<()> {
        let parent = Path::new(&self.cgroup_parent);
        let escapes = parent
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if self.cgroup_parent.is_empty() || escapes {
            return Err(CaskError::config(format!(
                "cgroup parent {:?} must be a relative path below the cgroup root",
                self.cgroup_parent
            )));
        }
        Ok(())
    }

    /// Directory holding every cask container group.
    #[must_use]
    pub fn cgroup_base(&self) -> PathBuf {
        self.cgroup_root.join(&self.cgroup_parent)
    }

    /// Resolves the binary to re-execute as the container init.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the current executable
    /// cannot be determined.
    pub fn resolve_self_exe(&self) -> Result<PathBuf> {
        if let Some(exe) = &self.self_exe {
            return Ok(exe.clone());
        }
        std::env::current_exe().map_err(|e| CaskError::Io {
            path: PathBuf::from("/proc/self/exe"),
            source: e,
        })
    }
}
