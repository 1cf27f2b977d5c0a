//! CLI command definitions and dispatch.

pub mod cleanup;
pub mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use cask_common::config::RuntimeConfig;
use cask_common::constants::{APP_NAME, ENV_LOG_JSON};
use clap::{Parser, Subcommand};

/// cask: run a command in an isolated Linux container.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON runtime configuration file.
    #[arg(long, global = true, env = "CASK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Mount point of the cgroup v2 hierarchy.
    #[arg(long, global = true)]
    pub cgroup_root: Option<PathBuf>,

    /// Sub-directory of the cgroup root holding cask groups.
    #[arg(long, global = true)]
    pub cgroup_parent: Option<String>,

    /// Emit logs as JSON lines on stderr.
    #[arg(
        long,
        global = true,
        env = ENV_LOG_JSON,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in a new container and exit with its status.
    Run(run::RunArgs),
    /// Remove the cgroup left behind by a container.
    Cleanup(cleanup::CleanupArgs),
}

impl Cli {
    /// Resolves the runtime configuration: defaults, then the config
    /// file, then environment variables, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// is invalid.
    pub fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let base = match &self.config {
            Some(path) => RuntimeConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        let mut config = base.with_env_overrides();
        if let Some(root) = &self.cgroup_root {
            config.cgroup_root.clone_from(root);
        }
        if let Some(parent) = &self.cgroup_parent {
            config.cgroup_parent.clone_from(parent);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command fails before a container status is
/// available.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.runtime_config()?;
    match cli.command {
        Command::Run(args) => run::execute(args, config, cli.log_json),
        Command::Cleanup(args) => cleanup::execute(&args, config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("cask.json");
        std::fs::write(&file, r#"{ "cgroup_parent": "from-file" }"#).expect("write");
        let cli = Cli::parse_from([
            "cask",
            "--config",
            file.to_str().expect("utf-8"),
            "--cgroup-parent",
            "from-flag",
            "cleanup",
            "abc",
        ]);

        let config = cli.runtime_config().expect("config");

        assert_eq!(config.cgroup_parent, "from-flag");
    }

    #[test]
    fn invalid_parent_flag_is_rejected() {
        let cli = Cli::parse_from(["cask", "--cgroup-parent", "../up", "cleanup", "abc"]);
        assert!(cli.runtime_config().is_err());
    }
}
