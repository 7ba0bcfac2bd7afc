//! Host/guest startup rendezvous over a raw pipe.
//!
//! The host keeps the write end until it either releases the guest or
//! aborts the launch; the guest blocks on a single-byte read before it
//! mutates any global state. Anything other than the proceed byte —
//! including a closed channel — is a refusal.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use corral_common::error::{CorralError, Result};
use nix::unistd;

/// Byte sent by the host to release the guest.
pub const PROCEED: u8 = b'g';

/// Byte sent by the host to abort the launch.
pub const ABORT: u8 = b's';

/// Creates a connected handshake pair.
///
/// # Errors
///
/// Returns an error if the underlying pipe cannot be created.
pub fn handshake() -> Result<(HostSignal, GuestGate)> {
    let (read_end, write_end) =
        unistd::pipe().map_err(|e| CorralError::syscall("pipe", e))?;
    Ok((HostSignal { fd: write_end }, GuestGate { fd: read_end }))
}

/// Host-owned write end of the handshake channel.
///
/// Both [`HostSignal::release`] and [`HostSignal::abort`] consume the
/// signal, closing the write end so the guest can never observe a second
/// byte.
#[derive(Debug)]
pub struct HostSignal {
    fd: OwnedFd,
}

impl HostSignal {
    /// Releases the guest to begin finalization.
    ///
    /// # Errors
    ///
    /// Returns an error if the proceed byte cannot be written, which
    /// usually means the guest is already gone.
    pub fn release(self) -> Result<()> {
        let n = unistd::write(&self.fd, &[PROCEED])
            .map_err(|e| CorralError::syscall("handshake write", e))?;
        if n != 1 {
            return Err(CorralError::config("handshake write was truncated"));
        }
        Ok(())
    }

    /// Tells the guest to abort. Best effort: a guest that already died
    /// cannot be told anything, and the caller is on an error path anyway.
    pub fn abort(self) {
        let _ = unistd::write(&self.fd, &[ABORT]);
    }

    /// Raw descriptor of the write end, for closing the inherited copy
    /// inside a freshly spawned guest.
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Guest-owned read end of the handshake channel.
#[derive(Debug)]
pub struct GuestGate {
    fd: OwnedFd,
}

impl GuestGate {
    /// Blocks until the host signals, then reports whether the guest may
    /// proceed.
    ///
    /// # Errors
    ///
    /// Returns an error on an abort byte, on a channel closed without a
    /// signal, or on a failed read. Callers must not mutate anything once
    /// this fails.
    pub fn wait(&self) -> Result<()> {
        let mut buf = [0u8; 1];
        let n = unistd::read(&self.fd, &mut buf)
            .map_err(|e| CorralError::syscall("handshake read", e))?;
        if n == 0 {
            return Err(CorralError::config("handshake channel closed before release"));
        }
        if buf[0] != PROCEED {
            return Err(CorralError::config(format!(
                "handshake refused with byte {:#04x}",
                buf[0]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    use super::*;

    fn guest_exit_code(gate: &GuestGate) -> i32 {
        i32::from(gate.wait().is_err())
    }

    #[test]
    fn gate_opens_on_release() {
        let (host, gate) = handshake().expect("handshake pair");
        match unsafe { fork() }.expect("fork") {
            ForkResult::Parent { child } => {
                host.release().expect("release should reach the child");
                let status = waitpid(child, None).expect("waitpid");
                assert_eq!(status, WaitStatus::Exited(child, 0));
            }
            ForkResult::Child => {
                drop(host);
                std::process::exit(guest_exit_code(&gate));
            }
        }
    }

    #[test]
    fn gate_refuses_on_abort() {
        let (host, gate) = handshake().expect("handshake pair");
        match unsafe { fork() }.expect("fork") {
            ForkResult::Parent { child } => {
                host.abort();
                let status = waitpid(child, None).expect("waitpid");
                assert_eq!(status, WaitStatus::Exited(child, 1));
            }
            ForkResult::Child => {
                drop(host);
                std::process::exit(guest_exit_code(&gate));
            }
        }
    }

    #[test]
    fn gate_refuses_when_host_closes_without_signal() {
        let (host, gate) = handshake().expect("handshake pair");
        match unsafe { fork() }.expect("fork") {
            ForkResult::Parent { child } => {
                // Dropping the write end closes the channel with no byte
                // sent; the blocked guest must refuse, not hang.
                drop(host);
                let status = waitpid(child, None).expect("waitpid");
                assert_eq!(status, WaitStatus::Exited(child, 1));
            }
            ForkResult::Child => {
                // The child's inherited copy of the write end would keep
                // the pipe open; close it so EOF can be observed.
                drop(host);
                std::process::exit(guest_exit_code(&gate));
            }
        }
    }
}
