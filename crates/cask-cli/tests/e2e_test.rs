//! End-to-end tests driving the `cask` binary.
//!
//! Tests that create namespaces need root and return early otherwise.
//! Tests against the host cgroup hierarchy additionally need cgroup v2.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cask() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cask"));
    let _ = cmd.env_remove("CASK_CGROUP_ROOT").env_remove("CASK_CGROUP_PARENT");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("spawn cask")
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn host_cgroup_v2() -> bool {
    Path::new("/sys/fs/cgroup/cgroup.controllers").is_file()
}

fn unique_id(tag: &str) -> String {
    format!("e2e-{tag}-{}", std::process::id())
}

/// Builds a rootfs holding only `/bin/true` and the shared objects it
/// loads. Returns `None` when the host has no usable `/bin/true`.
fn minimal_rootfs(dir: &Path) -> Option<()> {
    let binary = Path::new("/bin/true");
    if !binary.exists() {
        return None;
    }
    let mut files = vec![binary.to_path_buf()];
    // A static binary makes ldd fail; then the binary alone suffices.
    if let Ok(out) = Command::new("ldd").arg(binary).output() {
        files.extend(
            String::from_utf8_lossy(&out.stdout)
                .split_whitespace()
                .filter(|token| token.starts_with('/'))
                .map(PathBuf::from),
        );
    }
    for file in files {
        let target = dir.join(file.strip_prefix("/").ok()?);
        std::fs::create_dir_all(target.parent()?).ok()?;
        let _ = std::fs::copy(&file, &target).ok()?;
    }
    Some(())
}

// ── Without privileges ───────────────────────────────────────────────

#[test]
fn missing_rootfs_exits_with_setup_status_and_no_cgroup() {
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let out = run(cask()
        .arg("--cgroup-root")
        .arg(cgroups.path())
        .args(["run", "--rootfs", "/definitely/not/here", "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(125));
    assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
}

#[test]
fn bad_memory_limit_exits_with_setup_status() {
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let out = run(cask()
        .env("CASK_CGROUP_ROOT", cgroups.path())
        .args(["run", "--rootfs", "/", "--memory", "lots", "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(125));
    assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
}

#[test]
fn separator_hostname_is_rejected_before_cgroup_work() {
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let out = run(cask()
        .arg("--cgroup-root")
        .arg(cgroups.path())
        .args(["run", "--rootfs", "/", "--hostname=--", "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(125));
    assert_eq!(std::fs::read_dir(cgroups.path()).expect("read").count(), 0);
}

#[test]
fn malformed_init_invocation_exits_with_setup_status() {
    let out = run(cask().args(["cask-init", "--hostname", "h1", "sh"]));
    assert_eq!(out.status.code(), Some(125));

    let out = run(cask().args(["cask-init", "--"]));
    assert_eq!(out.status.code(), Some(125));
}

#[test]
fn cleanup_of_unknown_container_succeeds() {
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let out = run(cask()
        .arg("--cgroup-root")
        .arg(cgroups.path())
        .args(["cleanup", "never-created"]));

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn cleanup_removes_a_leftover_group() {
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let leftover = cgroups.path().join("cask").join("stale");
    std::fs::create_dir_all(&leftover).expect("leftover group");

    let out = run(cask()
        .arg("--cgroup-root")
        .arg(cgroups.path())
        .args(["cleanup", "stale"]));

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(!leftover.exists());
}

// ── With root and namespaces ─────────────────────────────────────────

#[test]
fn true_exits_zero_and_removes_its_cgroup() {
    if !is_root() || !host_cgroup_v2() {
        return;
    }
    let id = unique_id("true");
    let out = run(cask().args(["run", "--rootfs", "/", "--id", &id, "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(!Path::new("/sys/fs/cgroup/cask").join(&id).exists());
}

#[test]
fn minimal_rootfs_gets_its_mount_points_created() {
    if !is_root() || !host_cgroup_v2() {
        return;
    }
    let rootfs = tempfile::tempdir().expect("rootfs");
    if minimal_rootfs(rootfs.path()).is_none() {
        return;
    }
    assert!(!rootfs.path().join("proc").exists());
    assert!(!rootfs.path().join("dev/pts").exists());

    let id = unique_id("minimal");
    let out = run(cask()
        .arg("run")
        .arg("--rootfs")
        .arg(rootfs.path())
        .args(["--id", &id, "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(rootfs.path().join("proc").is_dir());
    assert!(rootfs.path().join("dev/pts").is_dir());
    assert!(!Path::new("/sys/fs/cgroup/cask").join(&id).exists());
}

#[test]
fn exit_status_is_mirrored() {
    if !is_root() || !host_cgroup_v2() {
        return;
    }
    let out = run(cask().args(["run", "--rootfs", "/", "--", "/bin/sh", "-c", "exit 7"]));
    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn missing_command_exits_127() {
    if !is_root() || !host_cgroup_v2() {
        return;
    }
    let out = run(cask().args(["run", "--rootfs", "/", "--", "/no/such/binary"]));
    assert_eq!(out.status.code(), Some(127));
}

#[test]
fn hostname_and_pid_namespace_are_applied() {
    if !is_root() || !host_cgroup_v2() {
        return;
    }
    let script = r#"test "$(cat /proc/sys/kernel/hostname)" = box && test "$$" = 1"#;
    let out = run(cask().args([
        "run", "--rootfs", "/", "--hostname", "box", "--", "/bin/sh", "-c", script,
    ]));
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn memory_limit_is_written_to_the_group() {
    if !is_root() {
        return;
    }
    let cgroups = tempfile::tempdir().expect("cgroup root");
    let out = run(cask()
        .env("CASK_CGROUP_ROOT", cgroups.path())
        .args(["run", "--rootfs", "/", "--id", "limited", "--memory", "1m", "--", "/bin/true"]));

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    let written = std::fs::read_to_string(cgroups.path().join("cask/limited/memory.max"))
        .expect("memory.max");
    assert_eq!(written.trim(), "1048576");
}
