//! `cask cleanup`: remove a container's leftover cgroup.

use std::process::ExitCode;

use cask_common::config::RuntimeConfig;
use cask_common::types::ContainerId;
use cask_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `cleanup` command.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Identifier of the container whose cgroup should be removed.
    pub id: String,
}

/// Executes the `cleanup` command. Succeeds when the group is already gone.
///
/// # Errors
///
/// Returns an error if the identifier is invalid or the group still has
/// member processes.
pub fn execute(args: &CleanupArgs, config: RuntimeConfig) -> anyhow::Result<ExitCode> {
    let id = ContainerId::new(args.id.as_str())?;
    Engine::new(config).cleanup(&id)?;
    Ok(ExitCode::SUCCESS)
}
