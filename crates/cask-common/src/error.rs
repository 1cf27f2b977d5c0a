//! Unified error types for the cask workspace.
//!
//! The variants follow the failure classes of a run: configuration and
//! protocol errors are raised before any kernel state changes, cgroup errors
//! are rolled back by the resource controller, isolation and exec errors are
//! fatal to the container's init process.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND, EXIT_SETUP_FAILURE};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CaskError {
    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The bootstrap argument vector handed to the init process is malformed.
    #[error("malformed bootstrap arguments: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A cgroup directory or control-file operation failed.
    #[error("cgroup operation failed for container {id} at {path}: {source}")]
    Cgroup {
        /// Container the cgroup belongs to.
        id: String,
        /// Directory or control file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A namespace, mount, or root-jail step failed inside the container.
    #[error("isolation step '{step}' failed at {path}: {source}")]
    Isolation {
        /// Name of the failing step.
        step: &'static str,
        /// Path the step operated on.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The isolated init process could not be created.
    #[error("failed to launch container {id}: {source}")]
    Launch {
        /// Container being launched.
        id: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The user command could not replace the init process image.
    #[error("failed to execute {path}: {source}")]
    Exec {
        /// Resolved path of the attempted executable.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CaskError {
    /// Shorthand for a [`CaskError::Config`] with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a [`CaskError::Protocol`] with the given message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns true for errors detected before any kernel state was mutated.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Protocol { .. } | Self::Serialization { .. }
        )
    }

    /// Process exit status reported for this error.
    ///
    /// Exec failures follow the shell convention (126 not executable,
    /// 127 not found); everything else is a setup failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exec { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                EXIT_NOT_FOUND
            }
            Self::Exec { .. } => EXIT_NOT_EXECUTABLE,
            _ => EXIT_SETUP_FAILURE,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CaskError>;
