//! # corral — minimal single-host container runtime CLI
//!
//! Starts isolated, resource-limited containers from a root filesystem,
//! tracks them in a shared registry, and can signal, enumerate, and exec
//! into them.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    commands::execute(cli)
}
