//! CLI command definitions and dispatch.

pub mod exec;
pub mod list;
pub mod start;
pub mod stop;

use clap::{Parser, Subcommand};

/// Corral — minimal single-host container runtime.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Print debug output for each step.
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a container from a root filesystem.
    Start(start::StartArgs),
    /// Signal a container and drop it from the registry.
    Stop(stop::StopArgs),
    /// List the pids of running containers.
    List(list::ListArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Start(args) => start::execute(args, cli.debug),
        Command::Stop(args) => stop::execute(args),
        Command::List(args) => list::execute(args),
        Command::Exec(args) => exec::execute(args),
    }
}
