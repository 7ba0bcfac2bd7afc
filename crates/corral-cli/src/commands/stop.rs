//! `corral stop` — Signal a container and drop it from the registry.

use clap::Args;
use corral_runtime::lifecycle::{self, StopOutcome};
use corral_runtime::registry::Registry;

/// SIGTERM.
const DEFAULT_SIGNAL: i32 = 15;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container init process pid in its parent PID namespace.
    pub pid: i32,

    /// Number of the signal to send (default SIGTERM).
    pub signal: Option<i32>,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error for an invalid signal, on registry failure, or when
/// delivering the signal fails.
pub fn execute(args: StopArgs) -> anyhow::Result<()> {
    let signal = args.signal.unwrap_or(DEFAULT_SIGNAL);
    let registry = Registry::open_default();

    match lifecycle::stop(&registry, args.pid, signal)? {
        StopOutcome::Delivered { signal } => {
            println!("sent signal {signal} to pid {}", args.pid);
        }
        outcome => {
            println!("signal not sent to pid {} because:", args.pid);
            if matches!(
                outcome,
                StopOutcome::NotRegistered | StopOutcome::NotRegisteredAndNotRunning
            ) {
                println!("  the process was not started by corral");
            }
            if matches!(
                outcome,
                StopOutcome::NotRunning | StopOutcome::NotRegisteredAndNotRunning
            ) {
                println!("  the process is not running");
            }
        }
    }
    Ok(())
}
