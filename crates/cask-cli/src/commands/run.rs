//! `cask run`: run one command in a new container.

use std::path::PathBuf;
use std::process::ExitCode;

use cask_common::config::RuntimeConfig;
use cask_common::constants::ENV_LOG_JSON;
use cask_common::types::{ContainerId, ContainerSpec, CpuQuota, parse_memory_limit};
use cask_runtime::engine::Engine;
use clap::Args;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory used as the container's root filesystem.
    #[arg(long)]
    pub rootfs: PathBuf,

    /// Hostname inside the container.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Relative CPU weight (1-10000); 0 leaves it unset.
    #[arg(long, default_value_t = 0)]
    pub cpu_weight: u64,

    /// CPU bandwidth limit as a number of CPUs, e.g. 0.5.
    #[arg(long)]
    pub cpus: Option<String>,

    /// Memory limit such as 512m or 1g; 0 leaves it unset.
    #[arg(long)]
    pub memory: Option<String>,

    /// Container identifier; a fresh UUID when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// Command and arguments to run, after `--`.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Validates the arguments into a container spec.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a bad limit, identifier, hostname
    /// or rootfs.
    pub fn to_spec(&self) -> cask_common::error::Result<ContainerSpec> {
        let mut builder = ContainerSpec::builder(&self.rootfs, self.command.clone())
            .cpu_weight(self.cpu_weight);
        if let Some(hostname) = &self.hostname {
            builder = builder.hostname(hostname);
        }
        if let Some(cpus) = &self.cpus {
            builder = builder.cpu_quota(CpuQuota::parse(cpus)?);
        }
        if let Some(memory) = &self.memory {
            builder = builder.memory_bytes(parse_memory_limit(memory)?);
        }
        if let Some(id) = &self.id {
            builder = builder.id(ContainerId::new(id.as_str())?);
        }
        builder.build()
    }
}

/// Executes the `run` command and returns the container's mirrored status.
///
/// # Errors
///
/// Returns an error if the spec is invalid or the container could not be
/// started.
pub fn execute(args: RunArgs, config: RuntimeConfig, log_json: bool) -> anyhow::Result<ExitCode> {
    let spec = args.to_spec()?;
    let mut engine = Engine::new(config);
    if log_json {
        engine = engine.with_init_env(ENV_LOG_JSON, "1");
    }
    let status = engine.run(&spec)?;
    if status.success() {
        tracing::info!(id = %spec.id(), "run finished");
    } else {
        tracing::info!(id = %spec.id(), %status, code = status.code(), "container exited unsuccessfully");
    }
    Ok(crate::exit_code(status.code()))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["cask", "run"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            Command::Cleanup(_) => unreachable!("parsed a run command"),
        }
    }

    #[test]
    fn payload_after_separator_is_verbatim() {
        let args = run_args(&["--rootfs", "/", "--", "sh", "-c", "echo --memory"]);
        assert_eq!(args.command, ["sh", "-c", "echo --memory"]);
        assert!(args.memory.is_none());
    }

    #[test]
    fn limits_flow_into_the_spec() {
        let rootfs = tempfile::tempdir().expect("rootfs");
        let root = rootfs.path().to_str().expect("utf-8");
        let args = run_args(&[
            "--rootfs", root, "--cpu-weight", "200", "--cpus", "1.5", "--memory", "64m",
            "--hostname", "box", "--id", "web-1", "--", "/bin/true",
        ]);

        let spec = args.to_spec().expect("spec");

        assert_eq!(spec.id().as_str(), "web-1");
        assert_eq!(spec.hostname(), Some("box"));
        assert_eq!(spec.limits().cpu_weight, Some(200));
        assert_eq!(spec.limits().memory_bytes, Some(64 * 1024 * 1024));
        assert_eq!(spec.limits().cpu_quota.map(|q| q.quota_us), Some(150_000));
    }

    #[test]
    fn bad_memory_limit_is_a_configuration_error() {
        let rootfs = tempfile::tempdir().expect("rootfs");
        let root = rootfs.path().to_str().expect("utf-8");
        let err = run_args(&["--rootfs", root, "--memory", "12x", "--", "/bin/true"])
            .to_spec()
            .expect_err("bad limit");
        assert!(err.is_configuration());
    }
}
