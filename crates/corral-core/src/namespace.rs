//! Linux namespace management for container isolation.
//!
//! Covers the three namespace-facing operations the runtime needs:
//! selecting which namespaces a new container isolates, joining the
//! namespaces of a running container, and writing the user-namespace id
//! maps for a freshly spawned guest.

use std::fs::{self, File};
use std::path::Path;

use corral_common::error::{CorralError, Result};
use nix::sched::{CloneFlags, setns};
use nix::unistd::{Gid, Pid, Uid};

/// Configuration for which namespaces to create or join.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate user namespace.
    pub user: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            network: true,
            user: true,
            ipc: true,
            uts: true,
        }
    }
}

impl NamespaceConfig {
    /// Translates the selection into `clone(2)` flags.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.user {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.network {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        flags
    }
}

/// Join order matters: the user namespace gates permission for every
/// subsequent join, and the mount namespace changes how later path
/// lookups resolve, so it must come last.
const JOIN_ORDER: [(&str, CloneFlags); 6] = [
    ("user", CloneFlags::CLONE_NEWUSER),
    ("ipc", CloneFlags::CLONE_NEWIPC),
    ("uts", CloneFlags::CLONE_NEWUTS),
    ("net", CloneFlags::CLONE_NEWNET),
    ("pid", CloneFlags::CLONE_NEWPID),
    ("mnt", CloneFlags::CLONE_NEWNS),
];

/// Moves the calling process into all six namespaces of `pid`.
///
/// All namespace files are opened up front, before the first `setns(2)`,
/// so a join that remaps path resolution cannot invalidate the rest.
///
/// # Errors
///
/// Returns an error if a namespace file cannot be opened or a
/// `setns(2)` call fails.
pub fn join(pid: Pid) -> Result<()> {
    let mut handles = Vec::with_capacity(JOIN_ORDER.len());
    for (name, flag) in JOIN_ORDER {
        let path = format!("/proc/{pid}/ns/{name}");
        let file = File::open(&path).map_err(|e| CorralError::io(&path, e))?;
        handles.push((file, flag));
    }
    for (file, flag) in handles {
        setns(file, flag).map_err(|e| CorralError::syscall("setns", e))?;
    }
    tracing::debug!(%pid, "joined namespaces");
    Ok(())
}

/// Writes the UID/GID maps for a freshly spawned guest, mapping root
/// inside the namespace to the invoking identity on the host.
///
/// An unprivileged writer must deny `setgroups` before the gid map is
/// accepted (CVE-2014-8989); a privileged writer must not, or the guest
/// loses the ability to clear its supplementary groups later.
///
/// # Errors
///
/// Returns an error if any of the `/proc/<pid>` map files cannot be
/// written.
pub fn write_id_maps(pid: Pid, host_uid: Uid, host_gid: Gid) -> Result<()> {
    let proc_dir = format!("/proc/{pid}");

    if !Uid::effective().is_root() {
        let setgroups_path = format!("{proc_dir}/setgroups");
        if Path::new(&setgroups_path).exists() {
            fs::write(&setgroups_path, "deny")
                .map_err(|e| CorralError::io(&setgroups_path, e))?;
        }
    }

    let uid_map_path = format!("{proc_dir}/uid_map");
    fs::write(&uid_map_path, format!("0 {host_uid} 1"))
        .map_err(|e| CorralError::io(&uid_map_path, e))?;

    let gid_map_path = format!("{proc_dir}/gid_map");
    fs::write(&gid_map_path, format!("0 {host_gid} 1"))
        .map_err(|e| CorralError::io(&gid_map_path, e))?;

    tracing::debug!(%pid, %host_uid, %host_gid, "wrote id maps");
    Ok(())
}
