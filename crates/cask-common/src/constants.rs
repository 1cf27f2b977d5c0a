//! System-wide constants and default paths.

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Sub-directory of the cgroup root reserved for cask containers.
pub const DEFAULT_CGROUP_PARENT: &str = "cask";

/// Reserved first argument selecting the in-container init entry point.
pub const INIT_MARKER: &str = "cask-init";

/// Init flag carrying the container hostname.
pub const HOSTNAME_FLAG: &str = "--hostname";

/// Separator between init flags and the user payload.
pub const PAYLOAD_SEPARATOR: &str = "--";

/// Exit status for failures before the user command starts.
pub const EXIT_SETUP_FAILURE: i32 = 125;

/// Exit status when the target command exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Exit status when the target command does not exist inside the rootfs.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Offset added to a signal number when a container dies from a signal.
pub const EXIT_SIGNAL_BASE: i32 = 128;

/// Lowest `cpu.weight` accepted by the kernel.
pub const CPU_WEIGHT_MIN: u64 = 1;

/// Highest `cpu.weight` accepted by the kernel.
pub const CPU_WEIGHT_MAX: u64 = 10_000;

/// Scheduling period written to `cpu.max`, in microseconds.
pub const CPU_PERIOD_US: u64 = 100_000;

/// Smallest quota the kernel accepts in `cpu.max`, in microseconds.
pub const CPU_QUOTA_MIN_US: u64 = 1_000;

/// Longest hostname accepted by `sethostname(2)`.
pub const HOSTNAME_MAX_LEN: usize = 64;

/// Environment variable overriding the cgroup root.
pub const ENV_CGROUP_ROOT: &str = "CASK_CGROUP_ROOT";

/// Environment variable overriding the reserved cgroup sub-directory.
pub const ENV_CGROUP_PARENT: &str = "CASK_CGROUP_PARENT";

/// Environment variable overriding the self-executable used for re-exec.
pub const ENV_SELF_EXE: &str = "CASK_SELF_EXE";

/// Environment variable selecting JSON log output; inherited by the
/// container init so both stages log alike.
pub const ENV_LOG_JSON: &str = "CASK_LOG_JSON";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Application name used in CLI output.
pub const APP_NAME: &str = "cask";
