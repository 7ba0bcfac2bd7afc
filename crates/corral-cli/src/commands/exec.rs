//! `corral exec` — Execute a command inside a running container.

use clap::Args;
use corral_runtime::exec;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container init process pid in its parent PID namespace.
    pub pid: i32,

    /// Command to run inside the container.
    pub cmd: String,

    /// Arguments for CMD.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Executes the `exec` command, propagating the joined command's exit
/// status as our own.
///
/// # Errors
///
/// Returns an error if joining the container fails.
pub fn execute(args: ExecArgs) -> anyhow::Result<()> {
    let code = exec::exec_into(args.pid, &args.cmd, &args.args)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
