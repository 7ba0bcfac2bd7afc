//! Cgroup hierarchy management and per-container CPU quotas.
//!
//! Each controller gets its own hierarchy under the runtime base path;
//! every container gets a directory named by its pid under the cpu
//! controller holding the quota/period pair and the task list.

use std::fs;
use std::path::{Path, PathBuf};

use corral_common::constants::{CGROUP_CONTROLLERS, CGROUP_ROOT, CPU_PERIOD_US};
use corral_common::error::{CorralError, Result};
use nix::errno::Errno;
use nix::mount::{MsFlags, mount};
use nix::unistd::Pid;

/// Computes the CPU quota in microseconds for one control period.
///
/// A container granted `cpu_percent` of the machine may consume that
/// share of every online CPU within each period.
#[must_use]
pub fn cpu_quota_us(period_us: u64, cpu_percent: u32, online_cpus: u64) -> u64 {
    (period_us / 100) * u64::from(cpu_percent) * online_cpus
}

/// Number of CPUs currently online.
#[allow(unsafe_code)]
#[must_use]
pub fn online_cpus() -> u64 {
    // Safety: sysconf has no memory-safety preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 { 1 } else { n as u64 }
}

/// Mounts the hierarchy for one controller if it is not mounted yet.
///
/// An `EBUSY` from `mount(2)` means the hierarchy is already in place and
/// counts as success, making the operation idempotent.
///
/// # Errors
///
/// Returns an error if the controller directory cannot be created or the
/// mount fails for any other reason.
pub fn ensure_mounted(controller: &str) -> Result<()> {
    let target = Path::new(CGROUP_ROOT).join(controller);
    fs::create_dir_all(&target).map_err(|e| CorralError::io(&target, e))?;
    match mount(
        Some("cgroup"),
        &target,
        Some("cgroup"),
        MsFlags::empty(),
        Some(controller),
    ) {
        Ok(()) | Err(Errno::EBUSY) => {
            tracing::debug!(controller, "controller hierarchy ready");
            Ok(())
        }
        Err(e) => Err(CorralError::syscall("mount cgroup", e)),
    }
}

/// Mounts every controller hierarchy the runtime uses.
///
/// # Errors
///
/// Returns the first mount failure.
pub fn mount_all() -> Result<()> {
    for controller in CGROUP_CONTROLLERS {
        ensure_mounted(controller)?;
    }
    Ok(())
}

/// Directory of a container's cpu cgroup.
#[must_use]
pub fn cpu_dir(pid: Pid) -> PathBuf {
    Path::new(CGROUP_ROOT).join("cpu").join(pid.to_string())
}

/// A container's entry in the cpu controller hierarchy.
///
/// The directory outlives the process unless [`CpuAssignment::remove`] is
/// called; a host that crashes between launch and stop orphans it.
#[derive(Debug)]
pub struct CpuAssignment {
    path: PathBuf,
}

impl CpuAssignment {
    /// Directory backing this assignment.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the per-container cgroup directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses the rmdir, typically because
    /// tasks are still attached.
    pub fn remove(self) -> Result<()> {
        fs::remove_dir(&self.path).map_err(|e| CorralError::io(&self.path, e))
    }
}

/// Creates the container's cpu cgroup and places `pid` in it with the
/// given CPU share.
///
/// The percent is validated at spec construction; this function assumes
/// it is within 0..=100.
///
/// # Errors
///
/// Returns an error if the directory or any control file write fails.
pub fn assign(pid: Pid, cpu_percent: u32) -> Result<CpuAssignment> {
    let dir = cpu_dir(pid);
    fs::create_dir_all(&dir).map_err(|e| CorralError::io(&dir, e))?;

    let quota = cpu_quota_us(CPU_PERIOD_US, cpu_percent, online_cpus());
    write_control(&dir, "cpu.cfs_period_us", &CPU_PERIOD_US.to_string())?;
    write_control(&dir, "cpu.cfs_quota_us", &quota.to_string())?;
    write_control(&dir, "tasks", &pid.to_string())?;

    tracing::debug!(%pid, cpu_percent, quota, "cpu cgroup assigned");
    Ok(CpuAssignment { path: dir })
}

/// Adds the calling process to the task list of `container`'s cpu cgroup.
///
/// # Errors
///
/// Returns an error if the container has no cpu cgroup or the task write
/// fails.
pub fn join_tasks(container: Pid) -> Result<()> {
    let dir = cpu_dir(container);
    write_control(&dir, "tasks", &std::process::id().to_string())
}

fn write_control(dir: &Path, name: &str, value: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, value).map_err(|e| CorralError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_for_half_of_four_cpus() {
        assert_eq!(cpu_quota_us(1_000_000, 50, 4), 2_000_000);
    }

    #[test]
    fn quota_for_full_machine() {
        assert_eq!(cpu_quota_us(1_000_000, 100, 8), 8_000_000);
    }

    #[test]
    fn quota_for_zero_percent_is_zero() {
        assert_eq!(cpu_quota_us(1_000_000, 0, 4), 0);
    }

    #[test]
    fn online_cpus_is_at_least_one() {
        assert!(online_cpus() >= 1);
    }
}
