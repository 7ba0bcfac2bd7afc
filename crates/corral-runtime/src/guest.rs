//! Guest-side finalization: everything the container's init process does
//! between the handshake release and `execvp`.
//!
//! The guest must not mutate any global state before the gate opens, and
//! every failing step maps to its own exit code — the exit status is the
//! only failure channel back to a foreground launcher. Step names are
//! visible at debug level only.

use std::convert::Infallible;
use std::ffi::CString;

use corral_common::constants::{
    CONTAINER_HOSTNAME, EXIT_EXEC, EXIT_FILESYSTEM, EXIT_HANDSHAKE, EXIT_SETUP,
};
use corral_common::error::{CorralError, Result};
use corral_common::types::ContainerSpec;
use corral_core::channel::GuestGate;
use corral_core::{filesystem, network};
use nix::unistd::{execvp, setgroups, sethostname, setsid};

/// Everything the cloned child needs, captured before the clone.
pub(crate) struct Guest<'a> {
    /// The launch description.
    pub spec: &'a ContainerSpec,
    /// Read end of the handshake channel.
    pub gate: &'a GuestGate,
    /// The child's inherited copy of the host's write end, to be closed
    /// before blocking on the gate.
    pub host_fd: std::os::fd::RawFd,
    /// Name of the veth end that was moved into this namespace, when
    /// networking is configured.
    pub veth_guest: Option<String>,
}

impl Guest<'_> {
    /// Runs the guest to completion. Returns only on failure; the exit
    /// code identifies the failing stage.
    #[allow(unsafe_code)]
    pub fn run(&self) -> isize {
        // Safety: closing an inherited descriptor in the child's own
        // descriptor table.
        let _ = unsafe { libc::close(self.host_fd) };

        if let Err(err) = self.gate.wait() {
            tracing::debug!(error = %err, "guest: handshake refused, exiting");
            return EXIT_HANDSHAKE as isize;
        }

        if let Err(err) = self.prepare_root() {
            tracing::debug!(error = %err, "guest: filesystem setup failed");
            return EXIT_FILESYSTEM as isize;
        }
        if let Err(err) = self.setup_identity() {
            tracing::debug!(error = %err, "guest: identity setup failed");
            return EXIT_SETUP as isize;
        }

        tracing::debug!(command = %self.spec.command, "guest: handing over to user command");
        match self.exec() {
            Ok(never) => match never {},
            Err(err) => {
                tracing::debug!(error = %err, "guest: exec failed");
                EXIT_EXEC as isize
            }
        }
    }

    fn prepare_root(&self) -> Result<()> {
        let root = &self.spec.rootfs;
        tracing::debug!(root = %root.display(), "guest: mounting pseudo filesystems");
        filesystem::mount_pseudo(root)?;
        tracing::debug!("guest: binding root onto itself");
        filesystem::make_root_private()?;
        filesystem::bind_self(root)?;
        tracing::debug!("guest: switching root");
        filesystem::switch_root(root)
    }

    fn setup_identity(&self) -> Result<()> {
        tracing::debug!(hostname = CONTAINER_HOSTNAME, "guest: setting hostname");
        sethostname(CONTAINER_HOSTNAME)
            .map_err(|e| CorralError::syscall("sethostname", e))?;

        if let (Some(net), Some(ifname)) = (self.spec.network, self.veth_guest.as_deref()) {
            tracing::debug!(ifname, ip = %net.container_ip, "guest: activating network");
            network::activate_guest_side(ifname, net.container_ip)?;
        }

        tracing::debug!("guest: clearing supplementary groups");
        setgroups(&[]).map_err(|e| CorralError::syscall("setgroups", e))?;
        filesystem::reset_umask();

        if self.spec.daemonize {
            tracing::debug!("guest: detaching session and stdio");
            let _ = setsid().map_err(|e| CorralError::syscall("setsid", e))?;
            filesystem::detach_stdio()?;
        }
        Ok(())
    }

    fn exec(&self) -> Result<Infallible> {
        let program = CString::new(self.spec.command.as_str())
            .map_err(|_| CorralError::config("command contains an interior NUL"))?;
        let mut argv = vec![program.clone()];
        for arg in &self.spec.args {
            argv.push(
                CString::new(arg.as_str())
                    .map_err(|_| CorralError::config("argument contains an interior NUL"))?,
            );
        }
        execvp(&program, &argv).map_err(|e| CorralError::syscall("execvp", e))
    }
}
