//! Isolated process creation via `clone(2)`.

use corral_common::error::{CorralError, Result};
use nix::sched::{self, CloneCb};
use nix::unistd::Pid;

use crate::namespace::NamespaceConfig;

/// Stack size for the cloned child. The child replaces its image with the
/// user command shortly after starting, so a fixed megabyte is plenty.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Spawns `cb` as a new process isolated according to `config`.
///
/// The child starts inside every namespace the configuration selects and
/// exits with the code the callback returns (unless the callback replaces
/// the process image first). SIGCHLD is requested so the parent can wait
/// for the child normally.
///
/// # Errors
///
/// Returns an error if the `clone(2)` syscall fails.
#[allow(unsafe_code)]
pub fn spawn_isolated(config: &NamespaceConfig, cb: CloneCb<'_>) -> Result<Pid> {
    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = config.clone_flags();
    // Safety: the child owns a full copy of the address space, so the
    // parent dropping its copy of the stack after clone returns is fine.
    let pid = unsafe { sched::clone(cb, &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| CorralError::syscall("clone", e))?;
    tracing::debug!(%pid, ?flags, "spawned isolated process");
    Ok(pid)
}
