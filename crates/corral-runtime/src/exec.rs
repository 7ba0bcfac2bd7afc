//! Running an additional command inside a live container.
//!
//! The calling process joins the target's cpu cgroup and all six of its
//! namespaces, re-roots itself, and forks; the child takes the namespace
//! root identity and replaces its image with the requested command while
//! the parent waits and propagates the exit status.

use std::ffi::CString;

use corral_common::constants::{EXIT_EXEC, EXIT_SETUP};
use corral_common::error::{CorralError, Result};
use corral_core::{cgroup, namespace};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Gid, Pid, Uid, chdir, chroot, execvp, fork, setgroups, setresgid, setresuid};

/// Joins the container with pid `pid` and runs `command` inside it.
/// Returns the command's exit status.
///
/// # Errors
///
/// Returns an error if the cgroup join, any namespace join, the re-root,
/// or the fork fails. Failures inside the forked child surface through
/// the returned exit status instead.
#[allow(unsafe_code)]
pub fn exec_into(pid: i32, command: &str, args: &[String]) -> Result<i32> {
    let target = Pid::from_raw(pid);
    tracing::debug!(pid, command, "joining container");

    cgroup::join_tasks(target)?;

    // The target's resolved root; entering the mount namespace later will
    // re-resolve the cwd, and the final chroot pins it.
    let root = format!("/proc/{pid}/root");
    chdir(root.as_str()).map_err(|e| CorralError::syscall("chdir", e))?;

    namespace::join(target)?;
    chroot(".").map_err(|e| CorralError::syscall("chroot", e))?;

    // Safety: the child only calls async-signal-safe operations before
    // exec or exit.
    match unsafe { fork() }.map_err(|e| CorralError::syscall("fork", e))? {
        ForkResult::Child => std::process::exit(run_joined(command, args)),
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).map_err(|e| CorralError::syscall("waitpid", e))?;
            Ok(match status {
                WaitStatus::Exited(_, code) => code,
                WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
                _ => 0,
            })
        }
    }
}

/// Child side: drop to the namespace's root identity and exec. Returns
/// the exit code to use when a step fails.
fn run_joined(command: &str, args: &[String]) -> i32 {
    if setgroups(&[]).is_err() {
        return EXIT_SETUP;
    }
    let root_gid = Gid::from_raw(0);
    if setresgid(root_gid, root_gid, root_gid).is_err() {
        return EXIT_SETUP;
    }
    let root_uid = Uid::from_raw(0);
    if setresuid(root_uid, root_uid, root_uid).is_err() {
        return EXIT_SETUP;
    }

    let Ok(program) = CString::new(command) else {
        return EXIT_EXEC;
    };
    let mut argv = vec![program.clone()];
    for arg in args {
        match CString::new(arg.as_str()) {
            Ok(arg) => argv.push(arg),
            Err(_) => return EXIT_EXEC,
        }
    }
    match execvp(&program, &argv) {
        Ok(never) => match never {},
        Err(e) => {
            tracing::debug!(error = %e, "exec in joined container failed");
            EXIT_EXEC
        }
    }
}
