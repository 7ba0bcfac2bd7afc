//! Veth provisioning between the host and a container's network
//! namespace.
//!
//! Link management goes through the `ip` helper binary rather than raw
//! netlink; the commands are the privileged-operation capability the
//! runtime needs, and their stderr is carried into the error when one
//! fails.

use std::net::Ipv4Addr;
use std::process::Command;

use corral_common::error::{CorralError, Result};
use nix::unistd::Pid;

/// Names of the two ends of a container's veth pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// Interface left on the host side.
    pub host: String,
    /// Interface moved into the container's network namespace.
    pub guest: String,
}

/// Derives interface names from the launcher's own pid.
///
/// Concurrent launches run in distinct launcher processes, so pid-derived
/// names cannot collide while both launchers are alive.
#[must_use]
pub fn veth_names(launcher_pid: u32) -> VethPair {
    VethPair {
        host: format!("crl{launcher_pid}h"),
        guest: format!("crl{launcher_pid}c"),
    }
}

/// Creates the veth pair, addresses and raises the host end, and moves
/// the guest end into the network namespace of `guest_pid`.
///
/// Runs entirely on the host side, before the guest is released; the
/// guest raises its own end afterwards.
///
/// # Errors
///
/// Returns an error if any `ip` invocation fails.
pub fn provision_host_side(pair: &VethPair, host_ip: Ipv4Addr, guest_pid: Pid) -> Result<()> {
    run_ip(&[
        "link", "add", &pair.host, "type", "veth", "peer", "name", &pair.guest,
    ])?;
    let host_addr = format!("{host_ip}/24");
    run_ip(&["addr", "add", &host_addr, "dev", &pair.host])?;
    run_ip(&["link", "set", &pair.host, "up"])?;
    let netns = guest_pid.to_string();
    run_ip(&["link", "set", &pair.guest, "netns", &netns])?;
    tracing::debug!(host = %pair.host, guest = %pair.guest, %host_ip, "veth provisioned");
    Ok(())
}

/// Raises loopback and the container end of the veth pair with the
/// configured address. Must run inside the container's network namespace.
///
/// # Errors
///
/// Returns an error if any `ip` invocation fails.
pub fn activate_guest_side(guest_if: &str, container_ip: Ipv4Addr) -> Result<()> {
    run_ip(&["link", "set", "lo", "up"])?;
    let addr = format!("{container_ip}/24");
    run_ip(&["addr", "add", &addr, "dev", guest_if])?;
    run_ip(&["link", "set", guest_if, "up"])
}

/// Deletes the host end of a pair. Best effort, for unwinding a launch
/// that failed after link creation; deleting either end removes both.
pub fn remove_host_link(host_if: &str) {
    if let Err(e) = run_ip(&["link", "del", host_if]) {
        tracing::debug!(host_if, error = %e, "veth cleanup failed");
    }
}

fn run_ip(args: &[&str]) -> Result<()> {
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|e| CorralError::io("ip", e))?;
    if output.status.success() {
        return Ok(());
    }
    Err(CorralError::Helper {
        command: format!("ip {}", args.join(" ")),
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veth_names_are_derived_from_launcher_pid() {
        let pair = veth_names(4321);
        assert_eq!(pair.host, "crl4321h");
        assert_eq!(pair.guest, "crl4321c");
    }

    #[test]
    fn veth_names_fit_the_kernel_interface_name_limit() {
        // IFNAMSIZ is 16 including the terminator.
        let pair = veth_names(u32::try_from(libc::pid_t::MAX).unwrap_or(4_194_304));
        assert!(pair.host.len() <= 15, "{} too long", pair.host);
        assert!(pair.guest.len() <= 15, "{} too long", pair.guest);
    }
}
