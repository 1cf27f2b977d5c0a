//! Memory resource control via cgroups v2.

use cask_common::error::Result;

use super::CgroupHandle;

/// Hard ceiling control file.
pub const MEMORY_MAX_FILE: &str = "memory.max";

/// Sets the hard memory limit for a cgroup, in bytes.
///
/// # Errors
///
/// Returns an error if writing to `memory.max` fails.
pub fn set_memory_max(group: &CgroupHandle, bytes: u64) -> Result<()> {
    group.write_control(MEMORY_MAX_FILE, &bytes.to_string())?;
    tracing::debug!(id = %group.id(), bytes, "memory max limit set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cask_common::config::RuntimeConfig;
    use cask_common::types::{ContainerId, ResourceLimits, parse_memory_limit};

    use super::super::scratch::ScratchFs;
    use super::*;

    #[test]
    fn one_kibibyte_is_written_as_bytes() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = RuntimeConfig {
            cgroup_root: root.path().to_path_buf(),
            ..RuntimeConfig::default()
        };
        let id = ContainerId::new("tiny").expect("id");
        let limits = ResourceLimits {
            memory_bytes: Some(parse_memory_limit("1k").expect("limit")),
            ..ResourceLimits::default()
        };

        let handle = CgroupHandle::create_with(Arc::new(ScratchFs::default()), &config, &id, &limits)
            .expect("create");

        let written = std::fs::read_to_string(handle.path().join(MEMORY_MAX_FILE)).expect("memory.max");
        assert_eq!(written, "1024");
    }
}
