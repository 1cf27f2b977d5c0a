//! Exit status of a container run.

use std::fmt;

use cask_common::constants::EXIT_SIGNAL_BASE;

/// How the container init terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with this status.
    Code(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// Status the orchestrator exits with: the code verbatim, or
    /// `128 + signo` for a signal.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Code(code) => code,
            Self::Signaled(signo) => EXIT_SIGNAL_BASE + signo,
        }
    }

    /// Whether the container exited with status 0.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit status {code}"),
            Self::Signaled(signo) => write!(f, "killed by signal {signo}"),
        }
    }
}
