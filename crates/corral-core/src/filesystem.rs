//! Guest-side filesystem plumbing: pseudo-filesystem mounts, the bind
//! precondition for a root switch, the pivot itself, and stdio handling
//! for daemonized containers.
//!
//! Everything here runs inside the guest's mount namespace after the
//! handshake releases it.

use std::fs::{self, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

use corral_common::error::{CorralError, Result};
use nix::errno::Errno;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::sys::stat::{Mode, umask};
use nix::unistd::{chdir, pivot_root};

/// Pseudo filesystems mounted under the container root before the pivot.
const PSEUDO_MOUNTS: [(&str, &str, &str); 3] = [
    ("proc", "proc", "proc"),
    ("tmpfs", "tmp", "tmpfs"),
    ("sysfs", "sys", "sysfs"),
];

/// Mounts `/proc`, `/tmp`, and `/sys` under the target root.
///
/// # Errors
///
/// Returns an error if a mount point cannot be created or a mount fails.
pub fn mount_pseudo(root: &Path) -> Result<()> {
    for (source, dir, fstype) in PSEUDO_MOUNTS {
        let target = root.join(dir);
        fs::create_dir_all(&target).map_err(|e| CorralError::io(&target, e))?;
        mount(
            Some(source),
            &target,
            Some(fstype),
            MsFlags::empty(),
            None::<&str>,
        )
        .map_err(|e| CorralError::syscall("mount", e))?;
    }
    Ok(())
}

/// Makes the whole mount tree private so the upcoming pivot cannot
/// propagate back to the host; a shared parent mount makes
/// `pivot_root(2)` fail outright.
///
/// # Errors
///
/// Returns an error if the remount fails.
pub fn make_root_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| CorralError::syscall("mount private", e))
}

/// Recursively bind-mounts the root path onto itself.
///
/// `pivot_root(2)` requires the new root to be a mount point; a plain
/// directory is not one until it is bound over itself.
///
/// # Errors
///
/// Returns an error if the bind mount fails.
pub fn bind_self(root: &Path) -> Result<()> {
    mount(
        Some(root),
        root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| CorralError::syscall("bind mount", e))
}

/// Swaps the process root onto `root` and detaches the old root.
///
/// Pivoting with the same path for both arguments stacks the old root on
/// top of the new one, so the lazy unmount of `.` drops the old root
/// without needing a scratch directory for it.
///
/// # Errors
///
/// Returns an error if any of the chdir/pivot/unmount steps fail.
pub fn switch_root(root: &Path) -> Result<()> {
    chdir(root).map_err(|e| CorralError::syscall("chdir", e))?;
    pivot_root(".", ".").map_err(|e| CorralError::syscall("pivot_root", e))?;
    umount2(".", MntFlags::MNT_DETACH).map_err(|e| CorralError::syscall("umount2", e))?;
    chdir("/").map_err(|e| CorralError::syscall("chdir", e))
}

/// Resets the file-creation mask to permissive.
pub fn reset_umask() {
    let _ = umask(Mode::empty());
}

/// Redirects the standard streams to `/dev/null` for a daemonized guest.
///
/// # Errors
///
/// Returns an error if `/dev/null` cannot be opened or duplicated onto
/// the standard descriptors.
#[allow(unsafe_code)]
pub fn detach_stdio() -> Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| CorralError::io("/dev/null", e))?;
    for target in 0..=2 {
        // Safety: plain descriptor duplication, no pointers involved.
        if unsafe { libc::dup2(null.as_raw_fd(), target) } < 0 {
            return Err(CorralError::syscall("dup2", Errno::last()));
        }
    }
    Ok(())
}
