//! Domain primitive types used across the Corral workspace.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::error::{CorralError, Result};

/// Host/container address pair for the container's veth link.
///
/// The host side always owns the address one above the container's, on the
/// same /24 (`--net 10.0.0.2` gives the container 10.0.0.2 and the host
/// 10.0.0.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Address assigned inside the container's network namespace.
    pub container_ip: Ipv4Addr,
    /// Address assigned to the host end of the veth pair.
    pub host_ip: Ipv4Addr,
}

impl NetworkConfig {
    /// Derives the pair from the container address.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Config`] for the broadcast address, which has
    /// no valid host-side successor.
    pub fn from_container_ip(container_ip: Ipv4Addr) -> Result<Self> {
        if container_ip == Ipv4Addr::BROADCAST {
            return Err(CorralError::config(format!(
                "container ip {container_ip} is the broadcast address"
            )));
        }
        let host_ip = Ipv4Addr::from(u32::from(container_ip) + 1);
        Ok(Self {
            container_ip,
            host_ip,
        })
    }
}

/// Immutable, validated description of one container launch.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Path to the root filesystem the container will pivot into.
    pub rootfs: PathBuf,
    /// Command to execute as the container's init process.
    pub command: String,
    /// Arguments for the command.
    pub args: Vec<String>,
    /// CPU share granted to the container, in percent of all online CPUs.
    pub cpu_percent: u32,
    /// Veth addressing, when host/container networking is requested.
    pub network: Option<NetworkConfig>,
    /// Detach the container and return immediately after launch.
    pub daemonize: bool,
    /// Emit step-by-step debug events.
    pub debug: bool,
}

impl ContainerSpec {
    /// Validates and builds a spec.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Config`] when `cpu_percent` is outside
    /// 0..=100 or when the rootfs path is empty.
    pub fn new(
        rootfs: impl Into<PathBuf>,
        command: impl Into<String>,
        args: Vec<String>,
        cpu_percent: u32,
        network: Option<NetworkConfig>,
        daemonize: bool,
        debug: bool,
    ) -> Result<Self> {
        let rootfs = rootfs.into();
        if rootfs.as_os_str().is_empty() {
            return Err(CorralError::config("rootfs path is empty"));
        }
        if cpu_percent > 100 {
            return Err(CorralError::config(format!(
                "cpu percent {cpu_percent} is outside 0..=100"
            )));
        }
        Ok(Self {
            rootfs,
            command: command.into(),
            args,
            cpu_percent,
            network,
            daemonize,
            debug,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn spec_accepts_full_cpu_range() {
        for percent in [0, 1, 50, 100] {
            let spec = ContainerSpec::new("/tmp/rootfs", "/bin/sh", vec![], percent, None, false, false);
            assert!(spec.is_ok(), "{percent}% should validate");
        }
    }

    #[test]
    fn spec_rejects_cpu_over_100() {
        let spec = ContainerSpec::new("/tmp/rootfs", "/bin/sh", vec![], 101, None, false, false);
        assert!(spec.is_err(), "101% must be rejected before any syscall");
    }

    #[test]
    fn spec_rejects_empty_rootfs() {
        let spec = ContainerSpec::new("", "/bin/sh", vec![], 100, None, false, false);
        assert!(spec.is_err());
    }

    #[test]
    fn network_host_ip_is_container_ip_plus_one() {
        let net = NetworkConfig::from_container_ip(Ipv4Addr::new(10, 0, 0, 2)).expect("valid ip");
        assert_eq!(net.container_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(net.host_ip, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn network_increment_carries_across_octets() {
        let net = NetworkConfig::from_container_ip(Ipv4Addr::new(10, 0, 0, 255)).expect("valid ip");
        assert_eq!(net.host_ip, Ipv4Addr::new(10, 0, 1, 0));
    }

    #[test]
    fn network_rejects_broadcast_address() {
        let result = NetworkConfig::from_container_ip(Ipv4Addr::BROADCAST);
        assert!(result.is_err(), "255.255.255.255 has no host successor");
    }
}
