//! Bootstrap protocol between the orchestrator and the container init.
//!
//! The init is a re-execution of the same binary; its argument vector is
//! the only channel carrying configuration:
//!
//! ```text
//! <self-exe> cask-init [--hostname <name>] -- <command> [<arg>...]
//! ```
//!
//! Everything after `--` is the user payload and is passed on untouched.

use cask_common::constants::{HOSTNAME_FLAG, INIT_MARKER, PAYLOAD_SEPARATOR};
use cask_common::error::{CaskError, Result};
use cask_common::types::ContainerSpec;

/// Configuration carried across the re-exec boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMessage {
    hostname: Option<String>,
    command: Vec<String>,
}

impl BootstrapMessage {
    /// Builds a message from its parts.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if `command` is empty.
    pub fn new(hostname: Option<String>, command: Vec<String>) -> Result<Self> {
        if command.first().is_none_or(String::is_empty) {
            return Err(CaskError::protocol("empty command after separator"));
        }
        Ok(Self { hostname, command })
    }

    /// The message that launches `spec`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the spec has no command.
    pub fn from_spec(spec: &ContainerSpec) -> Result<Self> {
        Self::new(spec.hostname().map(str::to_owned), spec.command().to_vec())
    }

    /// Hostname to apply, if any.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// User command and arguments; the command is element zero.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Argument vector after the executable path, starting with the
    /// init marker.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![INIT_MARKER.to_owned()];
        if let Some(hostname) = &self.hostname {
            args.push(HOSTNAME_FLAG.to_owned());
            args.push(hostname.clone());
        }
        args.push(PAYLOAD_SEPARATOR.to_owned());
        args.extend(self.command.iter().cloned());
        args
    }

    /// Parses an argument vector that starts at the init marker.
    ///
    /// Parsing is strict: this is a contract between two halves of the
    /// same binary, so any unexpected token before the separator is an
    /// error rather than something to skip.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the marker is missing, a flag is
    /// unknown, repeated or lacks its value, the separator is missing, or
    /// no command follows it.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        match args.next() {
            Some(marker) if marker == INIT_MARKER => {}
            Some(other) => {
                return Err(CaskError::protocol(format!(
                    "expected {INIT_MARKER:?} as first argument, got {other:?}"
                )));
            }
            None => return Err(CaskError::protocol("empty argument vector")),
        }

        let mut hostname = None;
        loop {
            let Some(token) = args.next() else {
                return Err(CaskError::protocol(format!(
                    "missing separator {PAYLOAD_SEPARATOR:?}"
                )));
            };
            if token == PAYLOAD_SEPARATOR {
                break;
            }
            if token != HOSTNAME_FLAG {
                return Err(CaskError::protocol(format!("unexpected argument {token:?}")));
            }
            if hostname.is_some() {
                return Err(CaskError::protocol("hostname given more than once"));
            }
            match args.next() {
                Some(value) if value != PAYLOAD_SEPARATOR => hostname = Some(value),
                _ => return Err(CaskError::protocol("--hostname requires a value")),
            }
        }

        Self::new(hostname, args.collect())
    }
}
