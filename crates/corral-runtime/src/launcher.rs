//! Host-side launch orchestration.
//!
//! The launch is a handshake-ordered state machine: clone the guest into
//! its namespaces, configure everything that needs the guest's pid
//! (id maps, cgroups, network, registry) while the guest blocks on the
//! gate, then release it. A failure while configuring aborts the guest
//! instead, unwinds partial host state best-effort, and propagates —
//! crucially before the registry ever saw the pid.

use corral_common::error::{CorralError, Result};
use corral_common::types::ContainerSpec;
use corral_core::channel::{self, HostSignal};
use corral_core::namespace::NamespaceConfig;
use corral_core::network::VethPair;
use corral_core::{cgroup, namespace, network, spawn};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Gid, Pid, Uid};

use crate::guest::Guest;
use crate::registry::Registry;

/// How a successful launch concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The container runs detached; the registry retains its pid until a
    /// later `stop`.
    Daemonized {
        /// Pid of the container's init process on the host.
        pid: i32,
    },
    /// The container ran in the foreground and terminated.
    Foreground {
        /// Pid the container had while it ran.
        pid: i32,
        /// Exit status to propagate to the caller (128+signal when the
        /// guest was signal-terminated).
        exit_code: i32,
    },
}

/// Launches a container described by `spec`, tracking it in `registry`.
///
/// Foreground launches block until the guest terminates — there is no
/// timeout, so a wedged guest blocks forever.
///
/// # Errors
///
/// Returns an error if the clone fails or any host-side configuration
/// step fails; in the latter case the guest has been told to abort and
/// the registry does not contain the pid.
pub fn start(spec: &ContainerSpec, registry: &Registry) -> Result<StartOutcome> {
    tracing::debug!(
        rootfs = %spec.rootfs.display(),
        command = %spec.command,
        cpu_percent = spec.cpu_percent,
        network = ?spec.network,
        daemonize = spec.daemonize,
        "starting container"
    );

    let ns = NamespaceConfig::default();
    let (host_signal, guest_gate) = channel::handshake()?;
    let veth = spec
        .network
        .map(|_| network::veth_names(std::process::id()));

    let guest = Guest {
        spec,
        gate: &guest_gate,
        host_fd: host_signal.raw_fd(),
        veth_guest: veth.as_ref().map(|pair| pair.guest.clone()),
    };
    let child = spawn::spawn_isolated(&ns, Box::new(|| guest.run()))?;
    // Host keeps only the write end from here on.
    drop(guest_gate);

    match configure_host(spec, child, veth.as_ref(), registry) {
        Ok(assignment) => {
            host_signal.release()?;
            finish(spec, child, assignment, registry)
        }
        Err(err) => {
            abort_launch(host_signal, child, veth.as_ref());
            Err(err)
        }
    }
}

/// Everything that needs the guest's pid, in handshake order. The
/// registry push comes last so a failing step never leaves a tracked pid
/// behind.
fn configure_host(
    spec: &ContainerSpec,
    child: Pid,
    veth: Option<&VethPair>,
    registry: &Registry,
) -> Result<cgroup::CpuAssignment> {
    namespace::write_id_maps(child, Uid::current(), Gid::current())?;

    cgroup::mount_all()?;
    let assignment = cgroup::assign(child, spec.cpu_percent)?;

    if let (Some(net), Some(pair)) = (spec.network, veth) {
        network::provision_host_side(pair, net.host_ip, child)?;
    }

    registry.push(child.as_raw())?;
    Ok(assignment)
}

/// Unwinds a failed launch: signal the guest to stop, drop whatever
/// partial host state exists, and reap the child. All best effort — the
/// original error is what the caller needs to see.
fn abort_launch(host_signal: HostSignal, child: Pid, veth: Option<&VethPair>) {
    host_signal.abort();
    if let Some(pair) = veth {
        network::remove_host_link(&pair.host);
    }
    if let Err(e) = std::fs::remove_dir(cgroup::cpu_dir(child)) {
        tracing::debug!(error = %e, "cgroup cleanup after aborted launch failed");
    }
    match waitpid(child, None) {
        Ok(status) => tracing::debug!(?status, "aborted guest reaped"),
        Err(e) => tracing::debug!(error = %e, "could not reap aborted guest"),
    }
}

fn finish(
    spec: &ContainerSpec,
    child: Pid,
    assignment: cgroup::CpuAssignment,
    registry: &Registry,
) -> Result<StartOutcome> {
    let pid = child.as_raw();
    tracing::info!(pid, "container released");

    if spec.daemonize {
        return Ok(StartOutcome::Daemonized { pid });
    }

    let status = waitpid(child, None).map_err(|e| CorralError::syscall("waitpid", e))?;
    let exit_code = match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => 0,
    };

    if !registry.remove_by_pid(pid)? {
        tracing::warn!(pid, "container was already removed from the registry");
    }
    if let Err(e) = assignment.remove() {
        tracing::warn!(pid, error = %e, "cpu cgroup cleanup failed");
    }

    Ok(StartOutcome::Foreground { pid, exit_code })
}
