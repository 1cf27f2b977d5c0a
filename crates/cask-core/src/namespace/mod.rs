//! Linux namespace requests for the container init.
//!
//! A [`NamespaceRequest`] names the isolation domains the kernel creates
//! when the init process is cloned. Network and user namespaces are not
//! representable: the container shares the host network stack and runs
//! with unmapped IDs.

pub mod uts;

use std::fmt;

/// One isolation domain the runtime may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Process ID space; the init becomes PID 1.
    Pid,
    /// Hostname and domain name.
    Uts,
    /// Mount table.
    Mount,
    /// System V IPC objects and POSIX message queues.
    Ipc,
}

impl Namespace {
    /// Every namespace the runtime knows about.
    pub const ALL: [Self; 4] = [Self::Pid, Self::Uts, Self::Mount, Self::Ipc];

    const fn bit(self) -> u8 {
        match self {
            Self::Pid => 1,
            Self::Uts => 1 << 1,
            Self::Mount => 1 << 2,
            Self::Ipc => 1 << 3,
        }
    }

    #[cfg(target_os = "linux")]
    const fn clone_flag(self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;
        match self {
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pid => "pid",
            Self::Uts => "uts",
            Self::Mount => "mnt",
            Self::Ipc => "ipc",
        };
        f.write_str(name)
    }
}

/// Set of namespaces to create at process-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceRequest {
    bits: u8,
}

impl NamespaceRequest {
    /// A request for no namespaces at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Adds a namespace to the request.
    #[must_use]
    pub const fn with(self, ns: Namespace) -> Self {
        Self {
            bits: self.bits | ns.bit(),
        }
    }

    /// Whether `ns` is part of the request.
    #[must_use]
    pub const fn contains(self, ns: Namespace) -> bool {
        self.bits & ns.bit() != 0
    }

    /// Iterates the requested namespaces in a fixed order.
    pub fn iter(self) -> impl Iterator<Item = Namespace> {
        Namespace::ALL.into_iter().filter(move |ns| self.contains(*ns))
    }

    /// Flags passed to `clone(2)`.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn clone_flags(self) -> nix::sched::CloneFlags {
        self.iter()
            .fold(nix::sched::CloneFlags::empty(), |flags, ns| flags | ns.clone_flag())
    }
}

impl Default for NamespaceRequest {
    /// PID, UTS, mount and IPC isolation.
    fn default() -> Self {
        Namespace::ALL.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for NamespaceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|ns| ns.to_string()).collect();
        write!(f, "[{}]", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_requests_all_four() {
        let request = NamespaceRequest::default();
        for ns in Namespace::ALL {
            assert!(request.contains(ns), "{ns} missing");
        }
        assert_eq!(request.to_string(), "[pid,uts,mnt,ipc]");
    }

    #[test]
    fn with_adds_only_that_namespace() {
        let request = NamespaceRequest::empty()
            .with(Namespace::Mount)
            .with(Namespace::Pid);
        assert!(!request.contains(Namespace::Ipc));
        assert!(request.contains(Namespace::Pid));
        assert_eq!(request.to_string(), "[pid,mnt]");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn clone_flags_never_include_network_or_user() {
        use nix::sched::CloneFlags;

        let flags = NamespaceRequest::default().clone_flags();
        assert!(flags.contains(
            CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWIPC
        ));
        assert!(!flags.intersects(CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWUSER));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn empty_request_has_no_flags() {
        assert!(NamespaceRequest::empty().clone_flags().is_empty());
    }
}
