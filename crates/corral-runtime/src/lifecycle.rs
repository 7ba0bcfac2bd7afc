//! Stop and list operations over registered containers.
//!
//! A registry pid may be recycled by the OS after the container dies, so
//! membership is always re-validated with a liveness probe before acting
//! on it. Liveness and registration are checked independently; the stop
//! outcome reports exactly which of the two held.

use corral_common::error::{CorralError, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::registry::Registry;

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The pid was registered and alive; the signal was sent.
    Delivered {
        /// The signal that was delivered.
        signal: Signal,
    },
    /// The pid was never registered (or already stopped) but a process
    /// with that pid is running.
    NotRegistered,
    /// The pid was registered but no such process is running any more.
    NotRunning,
    /// Neither registered nor running.
    NotRegisteredAndNotRunning,
}

/// Checks whether a process with this pid exists.
///
/// The null signal performs error checking without delivering anything,
/// which is exactly an existence probe.
#[must_use]
pub fn process_exists(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Removes `pid` from the registry and signals the process, but only when
/// both the registry lookup and the liveness probe succeed.
///
/// On delivery the container's cpu cgroup directory is removed best
/// effort; a failure there is logged, not surfaced.
///
/// # Errors
///
/// Returns an error for an invalid signal number, on registry failure, or
/// when sending the signal itself fails.
pub fn stop(registry: &Registry, pid: i32, signal: i32) -> Result<StopOutcome> {
    let signal = Signal::try_from(signal)
        .map_err(|_| CorralError::config(format!("invalid signal number {signal}")))?;

    let removed = registry.remove_by_pid(pid)?;
    let alive = process_exists(pid);
    tracing::debug!(pid, removed, alive, "stop checks");

    match (removed, alive) {
        (true, true) => {
            kill(Pid::from_raw(pid), signal).map_err(|e| CorralError::syscall("kill", e))?;
            if let Err(e) = std::fs::remove_dir(corral_core::cgroup::cpu_dir(Pid::from_raw(pid))) {
                tracing::debug!(pid, error = %e, "cpu cgroup cleanup failed");
            }
            Ok(StopOutcome::Delivered { signal })
        }
        (true, false) => Ok(StopOutcome::NotRunning),
        (false, true) => Ok(StopOutcome::NotRegistered),
        (false, false) => Ok(StopOutcome::NotRegisteredAndNotRunning),
    }
}

/// Lists the pids of registered containers that are still alive, in
/// registry order. Dead entries are reported out but left in place; use
/// [`prune`] to drop them explicitly.
///
/// # Errors
///
/// Returns an error on registry failure.
pub fn list(registry: &Registry) -> Result<Vec<i32>> {
    list_with(registry, process_exists)
}

/// [`list`] with the liveness probe supplied by the caller.
///
/// # Errors
///
/// Returns an error on registry failure.
pub fn list_with(registry: &Registry, probe: impl Fn(i32) -> bool) -> Result<Vec<i32>> {
    let mut live = Vec::new();
    let mut index = 0;
    while let Some(pid) = registry.get(index)? {
        if probe(pid) {
            live.push(pid);
        }
        index += 1;
    }
    Ok(live)
}

/// Removes registry entries whose process is gone and reports how many
/// were dropped.
///
/// The scan and each removal are separate registry critical sections, so
/// a concurrent writer can interleave; removal is keyed by pid rather
/// than position to keep that window from removing the wrong record.
///
/// # Errors
///
/// Returns an error on registry failure.
pub fn prune(registry: &Registry) -> Result<usize> {
    prune_with(registry, process_exists)
}

/// [`prune`] with the liveness probe supplied by the caller.
///
/// # Errors
///
/// Returns an error on registry failure.
pub fn prune_with(registry: &Registry, probe: impl Fn(i32) -> bool) -> Result<usize> {
    let mut dead = Vec::new();
    let mut index = 0;
    while let Some(pid) = registry.get(index)? {
        if !probe(pid) {
            dead.push(pid);
        }
        index += 1;
    }

    let mut removed = 0;
    for pid in dead {
        if registry.remove_by_pid(pid)? {
            removed += 1;
        }
    }
    Ok(removed)
}
