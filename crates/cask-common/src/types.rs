//! Domain primitive types used across the cask workspace.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CPU_PERIOD_US, CPU_QUOTA_MIN_US, HOSTNAME_MAX_LEN};
use crate::error::{CaskError, Result};

/// Unique identifier for a single container run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a caller-supplied value.
    ///
    /// The value names a cgroup directory, so it must be a single
    /// non-empty path component.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is empty, contains `/`,
    /// or is `.` or `..`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id == "." || id == ".." || id.contains('/') || id.contains('\0') {
            return Err(CaskError::config(format!(
                "container id {id:?} is not a valid directory name"
            )));
        }
        Ok(Self(id))
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU bandwidth limit written to `cpu.max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuQuota {
    /// Microseconds of CPU time allowed per period.
    pub quota_us: u64,
    /// Length of the accounting period in microseconds.
    pub period_us: u64,
}

impl CpuQuota {
    /// Builds a quota from a fraction of one CPU, e.g. `0.5` or `2`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is not a finite number
    /// greater than zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_cpus(cpus: f64) -> Result<Self> {
        if !cpus.is_finite() || cpus <= 0.0 {
            return Err(CaskError::config(format!(
                "CPU quota must be a number greater than 0, got {cpus}"
            )));
        }
        let quota_us = (cpus * CPU_PERIOD_US as f64).round() as u64;
        Ok(Self {
            quota_us: quota_us.max(CPU_QUOTA_MIN_US),
            period_us: CPU_PERIOD_US,
        })
    }

    /// Parses a CPU fraction given as text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-numeric or non-positive input.
    pub fn parse(cpus: &str) -> Result<Self> {
        let value: f64 = cpus
            .trim()
            .parse()
            .map_err(|_| CaskError::config(format!("invalid CPU quota {cpus:?}")))?;
        Self::from_cpus(value)
    }
}

impl fmt::Display for CpuQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quota_us, self.period_us)
    }
}

/// Resource limits for a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Relative CPU weight (`cpu.weight`, nominally 1-10000).
    pub cpu_weight: Option<u64>,
    /// CPU bandwidth ceiling (`cpu.max`).
    pub cpu_quota: Option<CpuQuota>,
    /// Hard memory ceiling in bytes (`memory.max`).
    pub memory_bytes: Option<u64>,
}

/// Parses a memory limit such as `512m`, `1G`, `64k`, `100b` or `1048576`.
///
/// Suffixes are binary multiples and case-insensitive. A bare number is
/// a byte count.
///
/// # Errors
///
/// Returns a configuration error for empty input, a non-numeric value,
/// an unknown suffix, or a result that overflows 64 bits.
pub fn parse_memory_limit(limit: &str) -> Result<u64> {
    let trimmed = limit.trim();
    let invalid = |why: &str| CaskError::config(format!("invalid memory limit {limit:?}: {why}"));

    let Some(last) = trimmed.chars().last() else {
        return Err(invalid("empty value"));
    };
    let (digits, multiplier) = if last.is_ascii_digit() {
        (trimmed, 1_u64)
    } else {
        let multiplier = match last.to_ascii_lowercase() {
            'b' => 1,
            'k' => 1 << 10,
            'm' => 1 << 20,
            'g' => 1 << 30,
            _ => return Err(invalid("unknown unit suffix")),
        };
        (&trimmed[..trimmed.len() - last.len_utf8()], multiplier)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected decimal digits"));
    }
    let value: u64 = digits.parse().map_err(|_| invalid("value out of range"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("value out of range"))
}

/// Checks a hostname against what `sethostname(2)` accepts.
///
/// # Errors
///
/// Returns a configuration error if the hostname is empty, longer than
/// 64 bytes, contains a NUL byte, or starts with `-`. A leading dash is
/// invalid in a DNS label and would read as a flag in the init's argv.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(CaskError::config("hostname must not be empty"));
    }
    if hostname.len() > HOSTNAME_MAX_LEN {
        return Err(CaskError::config(format!(
            "hostname {hostname:?} exceeds {HOSTNAME_MAX_LEN} bytes"
        )));
    }
    if hostname.contains('\0') {
        return Err(CaskError::config("hostname contains a NUL byte"));
    }
    if hostname.starts_with('-') {
        return Err(CaskError::config(format!(
            "hostname {hostname:?} must not start with '-'"
        )));
    }
    Ok(())
}

/// Everything needed to run one container. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    id: ContainerId,
    rootfs: PathBuf,
    hostname: Option<String>,
    limits: ResourceLimits,
    command: Vec<String>,
}

impl ContainerSpec {
    /// Starts building a spec for `command` jailed in `rootfs`.
    pub fn builder(rootfs: impl Into<PathBuf>, command: Vec<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder {
            id: None,
            rootfs: rootfs.into(),
            hostname: None,
            limits: ResourceLimits::default(),
            command,
        }
    }

    /// Unique identifier of this run.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Directory that becomes the container's filesystem root.
    #[must_use]
    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Hostname applied inside the UTS namespace, if any.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// CPU and memory budget.
    #[must_use]
    pub const fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// User command followed by its arguments.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// Builder for [`ContainerSpec`]; [`ContainerSpecBuilder::build`] validates.
#[derive(Debug, Clone)]
pub struct ContainerSpecBuilder {
    id: Option<ContainerId>,
    rootfs: PathBuf,
    hostname: Option<String>,
    limits: ResourceLimits,
    command: Vec<String>,
}

impl ContainerSpecBuilder {
    /// Uses a caller-chosen identifier instead of a generated one.
    #[must_use]
    pub fn id(mut self, id: ContainerId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the container hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the relative CPU weight. Zero means "leave the default".
    #[must_use]
    pub const fn cpu_weight(mut self, weight: u64) -> Self {
        self.limits.cpu_weight = if weight == 0 { None } else { Some(weight) };
        self
    }

    /// Sets the CPU bandwidth ceiling.
    #[must_use]
    pub const fn cpu_quota(mut self, quota: CpuQuota) -> Self {
        self.limits.cpu_quota = Some(quota);
        self
    }

    /// Sets the memory ceiling in bytes. Zero means "no limit".
    #[must_use]
    pub const fn memory_bytes(mut self, bytes: u64) -> Self {
        self.limits.memory_bytes = if bytes == 0 { None } else { Some(bytes) };
        self
    }

    /// Validates the input and produces the immutable spec.
    ///
    /// Only reads the filesystem; nothing is created.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the rootfs is missing or not a
    /// directory, the command is empty, or the hostname is invalid.
    pub fn build(self) -> Result<ContainerSpec> {
        let meta = std::fs::metadata(&self.rootfs).map_err(|e| {
            CaskError::config(format!(
                "rootfs {} is not accessible: {e}",
                self.rootfs.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(CaskError::config(format!(
                "rootfs {} is not a directory",
                self.rootfs.display()
            )));
        }
        match self.command.first() {
            None => return Err(CaskError::config("no command given")),
            Some(cmd) if cmd.is_empty() => return Err(CaskError::config("command is empty")),
            Some(_) => {}
        }
        if let Some(hostname) = &self.hostname {
            validate_hostname(hostname)?;
        }
        Ok(ContainerSpec {
            id: self.id.unwrap_or_else(ContainerId::generate),
            rootfs: self.rootfs,
            hostname: self.hostname,
            limits: self.limits,
            command: self.command,
        })
    }
}
