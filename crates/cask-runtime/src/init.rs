//! Container init: the second stage of a launch.
//!
//! Runs as PID 1 of the new PID namespace with the rootfs as its working
//! directory. It applies the hostname, jails itself into that directory
//! with fresh pseudo-filesystems, and replaces itself with the user
//! command. Nothing here returns on success.

use std::convert::Infallible;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use cask_common::error::{CaskError, Result};
use cask_core::filesystem::FilesystemJail;
use cask_core::namespace::uts;

use crate::bootstrap::{c_environment, c_string};
use crate::protocol::BootstrapMessage;

/// Runs the init with the argument vector that follows the executable
/// path (it starts at the init marker).
///
/// # Errors
///
/// Only returns on failure: malformed arguments, a failed isolation step,
/// or an exec that did not go through. The caller exits with
/// [`CaskError::exit_code`].
pub fn run<I, S>(args: I) -> Result<Infallible>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let message = BootstrapMessage::parse(args)?;
    tracing::debug!(pid = std::process::id(), command = ?message.command(), "container init starting");

    if let Some(hostname) = message.hostname() {
        uts::set_hostname(hostname)?;
    }

    let program = message
        .command()
        .first()
        .ok_or_else(|| CaskError::protocol("empty command after separator"))?;
    log_host_lookup(program);

    let root = std::env::current_dir().map_err(|e| CaskError::Isolation {
        step: "locate rootfs",
        path: PathBuf::from("."),
        source: e,
    })?;
    let _mounts = FilesystemJail::new(root).enter()?;

    let target = resolve_executable(program);
    exec(&target, message.command())
}

/// Path of the user command inside the jail. Absolute paths are kept;
/// anything else is taken relative to the new root. `$PATH` is not
/// searched.
#[must_use]
pub fn resolve_executable(program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new("/").join(path)
    }
}

fn log_host_lookup(program: &str) {
    if Path::new(program).is_absolute() {
        return;
    }
    match which::which(program) {
        Ok(host) => tracing::debug!(
            program,
            host = %host.display(),
            "host PATH match ignored; resolving relative to container root"
        ),
        Err(_) => tracing::debug!(program, "not on host PATH"),
    }
}

fn exec(target: &Path, command: &[String]) -> Result<Infallible> {
    let path = c_string(target.as_os_str())?;
    let argv = command
        .iter()
        .map(|arg| c_string(OsStr::new(arg)))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(path = %target.display(), "exec user command");

    let Err(errno) = nix::unistd::execve(&path, &argv, &c_environment(&[]));
    Err(CaskError::Exec {
        path: target.to_path_buf(),
        source: errno.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_commands_are_kept() {
        assert_eq!(resolve_executable("/bin/sh"), PathBuf::from("/bin/sh"));
    }

    #[test]
    fn relative_commands_resolve_against_root() {
        assert_eq!(resolve_executable("sh"), PathBuf::from("/sh"));
        assert_eq!(resolve_executable("bin/ls"), PathBuf::from("/bin/ls"));
    }

    #[test]
    fn malformed_arguments_fail_before_isolation() {
        let err = run(["cask-init", "--bogus", "--", "sh"]).expect_err("strict parse");
        assert!(matches!(err, CaskError::Protocol { .. }));
        assert_eq!(err.exit_code(), 125);
    }

    #[test]
    fn missing_executable_maps_to_127() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = exec(&missing, &["nope".into()]).expect_err("exec must fail");
        assert!(matches!(err, CaskError::Exec { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn non_executable_file_maps_to_126() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("data");
        std::fs::write(&data, "not a program").expect("write");
        let err = exec(&data, &["data".into()]).expect_err("exec must fail");
        assert_eq!(err.exit_code(), 126);
    }
}
