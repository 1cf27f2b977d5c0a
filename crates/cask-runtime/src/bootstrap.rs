//! Launches the container init inside fresh namespaces.
//!
//! The init is a re-execution of the current binary created with
//! `clone(2)`, so the PID namespace takes effect for the init itself and
//! the init becomes PID 1. Between `clone` and `execve` the child only
//! touches memory prepared by the parent: it changes into the rootfs,
//! which pins the directory the init will jail itself into, then execs.
//!
//! A close-on-exec pipe reports pre-exec failures. The parent reads it to
//! EOF: no bytes means `execve` succeeded and the init is running; a
//! record means the child failed and has already exited.

use std::ffi::{CString, OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use cask_common::constants::EXIT_SETUP_FAILURE;
use cask_common::error::{CaskError, Result};
use cask_common::types::ContainerSpec;
use cask_core::namespace::{Namespace, NamespaceRequest};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use crate::protocol::BootstrapMessage;
use crate::status::ExitStatus;

const CHILD_STACK_SIZE: usize = 1024 * 1024;
const REPORT_LEN: usize = 8;

/// Lifecycle of a single launch attempt. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// Nothing has been spawned yet.
    Unstarted,
    /// The child has been requested but has not exec'd yet.
    Launching,
    /// The init is running with this host PID.
    Running(Pid),
    /// The init terminated.
    Exited(ExitStatus),
    /// The child could not be created or failed before exec.
    LaunchFailed,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => f.write_str("unstarted"),
            Self::Launching => f.write_str("launching"),
            Self::Running(pid) => write!(f, "running({pid})"),
            Self::Exited(status) => write!(f, "exited({status})"),
            Self::LaunchFailed => f.write_str("launch-failed"),
        }
    }
}

/// Step of the child that failed before exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum ChildStage {
    Chdir = 1,
    Exec = 2,
}

impl ChildStage {
    const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Chdir),
            2 => Some(Self::Exec),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Chdir => "chdir into rootfs",
            Self::Exec => "exec of container init",
        }
    }
}

/// Everything the child needs, converted before `clone` so the child
/// never allocates.
#[derive(Debug)]
struct PreparedExec {
    exe: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    rootfs: CString,
}

impl PreparedExec {
    fn new(
        self_exe: &Path,
        rootfs: &Path,
        message: &BootstrapMessage,
        extra_env: &[(String, String)],
    ) -> Result<Self> {
        let exe = c_string(self_exe.as_os_str())?;
        let mut argv = Vec::with_capacity(message.command().len() + 4);
        argv.push(exe.clone());
        for arg in message.to_args() {
            argv.push(c_string(OsStr::new(&arg))?);
        }
        Ok(Self {
            exe,
            argv,
            envp: c_environment(extra_env),
            rootfs: c_string(rootfs.as_os_str())?,
        })
    }
}

/// The current environment as `KEY=VALUE` strings for `execve`, with
/// `extra` entries replacing inherited ones of the same name.
pub(crate) fn c_environment(extra: &[(String, String)]) -> Vec<CString> {
    std::env::vars_os()
        .filter(|(key, _)| !extra.iter().any(|(k, _)| key.as_os_str() == OsStr::new(k)))
        .chain(extra.iter().map(|(k, v)| (OsString::from(k), OsString::from(v))))
        .filter_map(|(key, value)| {
            let mut entry = key.as_bytes().to_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            CString::new(entry).ok()
        })
        .collect()
}

pub(crate) fn c_string(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes())
        .map_err(|_| CaskError::protocol(format!("argument {value:?} contains a NUL byte")))
}

/// A single attempt to run a container init. Not retried.
#[derive(Debug)]
pub struct Launch<'a> {
    spec: &'a ContainerSpec,
    namespaces: NamespaceRequest,
    self_exe: PathBuf,
    extra_env: Vec<(String, String)>,
    state: LaunchState,
}

impl<'a> Launch<'a> {
    /// Prepares a launch of `spec` by re-executing `self_exe`.
    #[must_use]
    pub const fn new(spec: &'a ContainerSpec, namespaces: NamespaceRequest, self_exe: PathBuf) -> Self {
        Self {
            spec,
            namespaces,
            self_exe,
            extra_env: Vec::new(),
            state: LaunchState::Unstarted,
        }
    }

    /// Adds environment variables for the init on top of the inherited
    /// environment.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.extra_env = env;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LaunchState {
        self.state
    }

    /// Checks that the init's setup stays inside namespaces it owns.
    ///
    /// The init always enters the filesystem jail and sets the hostname
    /// when one is given; without fresh mount and UTS namespaces those
    /// steps would change the orchestrator's own mount table and hostname.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the request lacks the mount
    /// namespace, or lacks the UTS namespace while a hostname is set.
    pub fn validate(&self) -> Result<()> {
        if !self.namespaces.contains(Namespace::Mount) {
            return Err(CaskError::config(format!(
                "namespace request {} lacks {}, required by the filesystem jail",
                self.namespaces,
                Namespace::Mount
            )));
        }
        if self.spec.hostname().is_some() && !self.namespaces.contains(Namespace::Uts) {
            return Err(CaskError::config(format!(
                "namespace request {} lacks {}, required to set a hostname",
                self.namespaces,
                Namespace::Uts
            )));
        }
        Ok(())
    }

    fn transition(&mut self, next: LaunchState) {
        tracing::debug!(id = %self.spec.id(), from = %self.state, to = %next, "launch state");
        self.state = next;
    }

    /// Spawns the init, calls `on_spawned` with its host PID once it has
    /// exec'd, and blocks until it terminates.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Launch`] if the child cannot be created, fails
    /// before exec, or cannot be waited for. A namespace request rejected
    /// by [`Launch::validate`], or a second call, is a configuration error.
    pub fn run(&mut self, on_spawned: impl FnOnce(Pid)) -> Result<ExitStatus> {
        if self.state != LaunchState::Unstarted {
            return Err(CaskError::config(format!(
                "launch of {} already attempted",
                self.spec.id()
            )));
        }
        self.validate()?;
        self.transition(LaunchState::Launching);

        let pid = match self.spawn() {
            Ok(pid) => pid,
            Err(e) => {
                self.transition(LaunchState::LaunchFailed);
                return Err(e);
            }
        };
        self.transition(LaunchState::Running(pid));
        tracing::info!(id = %self.spec.id(), pid = pid.as_raw(), namespaces = %self.namespaces, "container started");
        on_spawned(pid);

        let status = wait_for(pid).map_err(|e| self.launch_error(e))?;
        self.transition(LaunchState::Exited(status));
        tracing::info!(id = %self.spec.id(), %status, "container exited");
        Ok(status)
    }

    fn spawn(&self) -> Result<Pid> {
        let message = BootstrapMessage::from_spec(self.spec)?;
        let prepared =
            PreparedExec::new(&self.self_exe, self.spec.rootfs(), &message, &self.extra_env)?;

        let (read_end, write_end) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| self.launch_error(e.into()))?;
        let report = File::from(write_end);
        let mut stack = vec![0_u8; CHILD_STACK_SIZE];
        let child = Box::new(|| child_main(&prepared, &report));

        // SAFETY: the child runs on its own stack and only performs
        // async-signal-safe calls (chdir, write, execve) on data prepared
        // above; it never returns into code shared with the parent.
        let spawned = unsafe {
            nix::sched::clone(
                child,
                &mut stack,
                self.namespaces.clone_flags(),
                Some(libc::SIGCHLD),
            )
        };
        drop(report);
        let pid = spawned.map_err(|e| self.launch_error(e.into()))?;

        match read_report(File::from(read_end)) {
            Ok(None) => Ok(pid),
            Ok(Some((stage, errno))) => {
                let _ = wait_for(pid);
                let cause = io::Error::from_raw_os_error(errno);
                Err(self.launch_error(io::Error::new(
                    cause.kind(),
                    format!("{}: {cause}", stage.as_str()),
                )))
            }
            Err(e) => {
                let _ = nix::sys::signal::kill(pid, Signal::SIGKILL);
                let _ = wait_for(pid);
                Err(self.launch_error(e))
            }
        }
    }

    fn launch_error(&self, source: io::Error) -> CaskError {
        CaskError::Launch {
            id: self.spec.id().to_string(),
            source,
        }
    }
}

/// Body of the cloned child. Returns only on failure; the return value
/// becomes the child's exit status.
fn child_main(prepared: &PreparedExec, report: &File) -> isize {
    if let Err(errno) = nix::unistd::chdir(prepared.rootfs.as_c_str()) {
        report_failure(report, ChildStage::Chdir, errno);
        return EXIT_SETUP_FAILURE as isize;
    }
    let Err(errno) = nix::unistd::execve(&prepared.exe, &prepared.argv, &prepared.envp);
    report_failure(report, ChildStage::Exec, errno);
    EXIT_SETUP_FAILURE as isize
}

fn report_failure(mut report: &File, stage: ChildStage, errno: Errno) {
    let mut record = [0_u8; REPORT_LEN];
    record[..4].copy_from_slice(&(stage as u32).to_le_bytes());
    record[4..].copy_from_slice(&(errno as i32).to_le_bytes());
    let _ = report.write_all(&record);
}

fn read_report(mut pipe: File) -> io::Result<Option<(ChildStage, i32)>> {
    let mut buf = Vec::with_capacity(REPORT_LEN);
    let _ = pipe.read_to_end(&mut buf)?;
    decode_report(&buf)
}

fn decode_report(buf: &[u8]) -> io::Result<Option<(ChildStage, i32)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    let malformed = || io::Error::new(io::ErrorKind::InvalidData, "truncated child failure report");
    let stage_raw: [u8; 4] = buf.get(..4).and_then(|b| b.try_into().ok()).ok_or_else(malformed)?;
    let errno_raw: [u8; 4] = buf
        .get(4..REPORT_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(malformed)?;
    let stage = ChildStage::from_raw(u32::from_le_bytes(stage_raw)).ok_or_else(malformed)?;
    Ok(Some((stage, i32::from_le_bytes(errno_raw))))
}

/// Blocks until `pid` terminates. Interrupted waits are retried.
fn wait_for(pid: Pid) -> io::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus::Code(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(ExitStatus::Signaled(signal as i32));
            }
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => return Err(e.into()),
        }
    }
}
