//! `corral list` — List the pids of running containers.

use clap::Args;
use corral_runtime::lifecycle;
use corral_runtime::registry::Registry;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Drop registry entries whose process is gone before listing.
    #[arg(long)]
    pub prune: bool,
}

/// Executes the `list` command.
///
/// Prints one live pid per line, in registry order. Dead entries are
/// skipped but kept unless `--prune` is given.
///
/// # Errors
///
/// Returns an error on registry failure.
pub fn execute(args: ListArgs) -> anyhow::Result<()> {
    let registry = Registry::open_default();

    if args.prune {
        let removed = lifecycle::prune(&registry)?;
        if removed > 0 {
            eprintln!("pruned {removed} dead entries");
        }
    }

    for pid in lifecycle::list(&registry)? {
        println!("{pid}");
    }
    Ok(())
}
