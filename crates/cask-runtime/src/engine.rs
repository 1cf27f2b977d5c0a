//! Orchestration stage of a container run.
//!
//! Drives one container from validated spec to mirrored exit status:
//! create the cgroup, launch the init, wait, and remove the cgroup.

use cask_common::config::RuntimeConfig;
use cask_common::error::{CaskError, Result};
use cask_common::types::{ContainerId, ContainerSpec};
use cask_core::cgroup::CgroupHandle;
use cask_core::namespace::NamespaceRequest;

use crate::bootstrap::Launch;
use crate::signal;
use crate::status::ExitStatus;

/// Runs containers against one runtime configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    config: RuntimeConfig,
    namespaces: NamespaceRequest,
    init_env: Vec<(String, String)>,
}

impl Engine {
    /// Creates an engine that isolates every namespace cask supports.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            namespaces: NamespaceRequest::default(),
            init_env: Vec::new(),
        }
    }

    /// Overrides the namespaces requested for each container.
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: NamespaceRequest) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Sets an environment variable for every container init, on top of
    /// the inherited environment.
    #[must_use]
    pub fn with_init_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_env.push((key.into(), value.into()));
        self
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs `spec` to completion and returns the container's exit status.
    ///
    /// No kernel state is touched until the configuration and spec have
    /// been checked. Once the cgroup exists it is removed on every path;
    /// a removal failure is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, cgroup setup errors, or launch errors.
    /// A container that runs and exits non-zero is not an error.
    pub fn run(&self, spec: &ContainerSpec) -> Result<ExitStatus> {
        self.config.validate()?;
        if !spec.rootfs().is_dir() {
            return Err(CaskError::config(format!(
                "rootfs {} is not a directory",
                spec.rootfs().display()
            )));
        }
        let self_exe = self.config.resolve_self_exe()?;
        let mut launch =
            Launch::new(spec, self.namespaces, self_exe).with_env(self.init_env.clone());
        launch.validate()?;
        tracing::info!(
            id = %spec.id(),
            rootfs = %spec.rootfs().display(),
            command = ?spec.command(),
            "starting container"
        );

        let cgroup = CgroupHandle::create(&self.config, spec.id(), spec.limits())?;
        signal::install_forwarding();

        let outcome = launch.run(|pid| {
            signal::track(pid);
            cgroup.release_self();
        });
        signal::untrack();

        if let Err(e) = cgroup.cleanup() {
            tracing::warn!(id = %spec.id(), error = %e, "cgroup was not removed");
        }
        outcome
    }

    /// Removes the cgroup of a container that is no longer running, for
    /// example after the orchestrator was killed.
    ///
    /// # Errors
    ///
    /// Returns an error if the group exists and cannot be removed.
    pub fn cleanup(&self, id: &ContainerId) -> Result<()> {
        self.config.validate()?;
        CgroupHandle::open(&self.config, id).cleanup()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn scratch_engine(root: &std::path::Path) -> Engine {
        Engine::new(RuntimeConfig {
            cgroup_root: root.to_path_buf(),
            ..RuntimeConfig::default()
        })
    }

    #[test]
    fn missing_rootfs_fails_before_cgroup_work() {
        let rootfs = tempfile::tempdir().expect("rootfs");
        let spec = ContainerSpec::builder(rootfs.path(), vec!["/bin/true".into()])
            .build()
            .expect("spec");
        drop(rootfs);

        let cgroups = tempfile::tempdir().expect("cgroup root");
        let err = scratch_engine(cgroups.path()).run(&spec).expect_err("rootfs gone");

        assert!(err.is_configuration());
        assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
    }

    #[test]
    fn invalid_parent_fails_before_cgroup_work() {
        let rootfs = tempfile::tempdir().expect("rootfs");
        let spec = ContainerSpec::builder(rootfs.path(), vec!["/bin/true".into()])
            .build()
            .expect("spec");
        let cgroups = tempfile::tempdir().expect("cgroup root");
        let engine = Engine::new(RuntimeConfig {
            cgroup_root: cgroups.path().to_path_buf(),
            cgroup_parent: "/abs".into(),
            self_exe: Some(PathBuf::from("/bin/false")),
        });

        assert!(engine.run(&spec).expect_err("bad parent").is_configuration());
        assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
    }

    #[test]
    fn host_namespace_request_fails_before_cgroup_work() {
        let rootfs = tempfile::tempdir().expect("rootfs");
        let spec = ContainerSpec::builder(rootfs.path(), vec!["/bin/true".into()])
            .hostname("leaked")
            .build()
            .expect("spec");
        let cgroups = tempfile::tempdir().expect("cgroup root");
        let engine = scratch_engine(cgroups.path()).with_namespaces(NamespaceRequest::empty());

        let err = engine.run(&spec).expect_err("host namespaces");

        assert!(err.is_configuration());
        assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
    }

    #[test]
    fn cleanup_of_unknown_container_is_a_no_op() {
        let cgroups = tempfile::tempdir().expect("cgroup root");
        let id = ContainerId::new("gone").expect("id");
        scratch_engine(cgroups.path()).cleanup(&id).expect("absent group");
    }

    #[test]
    fn namespaces_can_be_narrowed() {
        let engine = Engine::new(RuntimeConfig::default())
            .with_namespaces(NamespaceRequest::empty());
        assert_eq!(engine.namespaces, NamespaceRequest::empty());
        assert_eq!(engine.config().cgroup_parent, "cask");
    }
}
