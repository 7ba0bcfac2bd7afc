//! `corral start` — Start a container from a root filesystem.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Args;
use corral_common::types::{ContainerSpec, NetworkConfig};
use corral_runtime::launcher::{self, StartOutcome};
use corral_runtime::registry::Registry;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Path to the container root filesystem.
    pub image_path: PathBuf,

    /// Command to run as the container's init process.
    pub cmd: String,

    /// Arguments for CMD.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Percent of CPU resources allocated to the container.
    #[arg(long, value_name = "PERCENT", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(0..=100))]
    pub cpu: u32,

    /// Create a virtual network link; IP is the container address and
    /// IP+1 the host-side address.
    #[arg(long, value_name = "IP")]
    pub net: Option<Ipv4Addr>,

    /// Daemonize the container.
    #[arg(short, long)]
    pub daemonize: bool,
}

/// Executes the `start` command.
///
/// A foreground start exits with the container's own exit status; a
/// daemonized start prints the container pid and returns immediately.
///
/// # Errors
///
/// Returns an error if spec validation or any host-side launch step
/// fails.
pub fn execute(args: StartArgs, debug: bool) -> anyhow::Result<()> {
    let network = args.net.map(NetworkConfig::from_container_ip).transpose()?;
    let spec = ContainerSpec::new(
        args.image_path,
        args.cmd,
        args.args,
        args.cpu,
        network,
        args.daemonize,
        debug,
    )?;

    let registry = Registry::open_default();
    match launcher::start(&spec, &registry)? {
        StartOutcome::Daemonized { pid } => {
            println!("{pid}");
            Ok(())
        }
        StartOutcome::Foreground { exit_code, .. } => {
            if exit_code == 0 {
                Ok(())
            } else {
                std::process::exit(exit_code)
            }
        }
    }
}
