//! CPU resource control via cgroups v2.
//!
//! Manages `cpu.weight` and `cpu.max`.

use cask_common::constants::{CPU_WEIGHT_MAX, CPU_WEIGHT_MIN};
use cask_common::error::Result;
use cask_common::types::CpuQuota;

use super::CgroupHandle;

/// Relative weight control file.
pub const CPU_WEIGHT_FILE: &str = "cpu.weight";

/// Bandwidth ceiling control file.
pub const CPU_MAX_FILE: &str = "cpu.max";

/// Whether the kernel accepts `weight` in `cpu.weight`.
#[must_use]
pub const fn weight_in_range(weight: u64) -> bool {
    weight >= CPU_WEIGHT_MIN && weight <= CPU_WEIGHT_MAX
}

/// Sets the CPU weight for a cgroup.
///
/// Weight controls the relative share of CPU time under contention. The
/// kernel accepts 1-10000; values outside that range are still written,
/// with a warning, and the kernel has the final say.
///
/// # Errors
///
/// Returns an error if writing to `cpu.weight` fails.
pub fn set_cpu_weight(group: &CgroupHandle, weight: u64) -> Result<()> {
    if !weight_in_range(weight) {
        tracing::warn!(
            id = %group.id(),
            weight,
            min = CPU_WEIGHT_MIN,
            max = CPU_WEIGHT_MAX,
            "cpu weight outside the cgroup v2 range, writing it anyway"
        );
    }
    group.write_control(CPU_WEIGHT_FILE, &weight.to_string())?;
    tracing::debug!(id = %group.id(), weight, "CPU weight set");
    Ok(())
}

/// Sets the CPU bandwidth limit.
///
/// Writes `quota_us period_us` to `cpu.max`.
///
/// # Errors
///
/// Returns an error if writing to `cpu.max` fails.
pub fn set_cpu_max(group: &CgroupHandle, quota: CpuQuota) -> Result<()> {
    group.write_control(CPU_MAX_FILE, &quota.to_string())?;
    tracing::debug!(
        id = %group.id(),
        quota_us = quota.quota_us,
        period_us = quota.period_us,
        "CPU max quota set"
    );
    Ok(())
}
