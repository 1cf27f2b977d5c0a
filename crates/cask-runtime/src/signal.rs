//! Forwards interactive interrupts to the running container.
//!
//! The orchestrator itself ignores Ctrl-C while a container runs; the
//! container init is killed instead, so the orchestrator still gets to
//! reap it and remove the cgroup.

use std::sync::Once;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

static CONTAINER_PID: AtomicI32 = AtomicI32::new(0);
static INSTALL: Once = Once::new();

/// Installs the process-wide interrupt handler. Safe to call repeatedly.
pub fn install_forwarding() {
    INSTALL.call_once(|| {
        if let Err(e) = ctrlc::set_handler(forward_interrupt) {
            tracing::warn!(error = %e, "interrupts will not be forwarded to containers");
        }
    });
}

/// Directs future interrupts at `pid`.
pub fn track(pid: Pid) {
    CONTAINER_PID.store(pid.as_raw(), Ordering::SeqCst);
}

/// Stops forwarding; interrupts are dropped until the next [`track`].
pub fn untrack() {
    CONTAINER_PID.store(0, Ordering::SeqCst);
}

fn forward_interrupt() {
    let raw = CONTAINER_PID.load(Ordering::SeqCst);
    if raw <= 0 {
        return;
    }
    match kill(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => tracing::info!(pid = raw, "interrupt received, container killed"),
        Err(e) => tracing::warn!(pid = raw, error = %e, "could not kill container"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_controls_the_forward_target() {
        track(Pid::from_raw(4242));
        assert_eq!(CONTAINER_PID.load(Ordering::SeqCst), 4242);

        untrack();
        forward_interrupt();
        assert_eq!(CONTAINER_PID.load(Ordering::SeqCst), 0);
    }
}
