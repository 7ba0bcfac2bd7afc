//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Corral runtime state on Linux with root access.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/corral";

/// Returns the runtime data directory, preferring `/var/lib/corral` and
/// falling back to `$HOME/.corral` when the system path is not writable.
fn resolve_runtime_dir() -> PathBuf {
    let system = PathBuf::from(SYSTEM_DATA_DIR);
    if std::fs::create_dir_all(&system).is_ok() {
        return system;
    }
    if let Ok(home) = std::env::var("HOME") {
        let user_dir = PathBuf::from(home).join(".corral");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    system
}

static RUNTIME_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved runtime directory for this session.
pub fn runtime_dir() -> &'static PathBuf {
    RUNTIME_DIR.get_or_init(resolve_runtime_dir)
}

/// Returns the default registry file path.
///
/// The registry is shared by every Corral invocation on the host.
pub fn registry_path() -> PathBuf {
    runtime_dir().join("pids")
}

/// Base path under which per-controller cgroup hierarchies are mounted.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Cgroup controllers mounted for containers.
pub const CGROUP_CONTROLLERS: [&str; 5] = ["cpu", "memory", "blkio", "cpuacct", "cpuset"];

/// CPU bandwidth control interval in microseconds.
pub const CPU_PERIOD_US: u64 = 1_000_000;

/// Hostname assigned inside a container's UTS namespace.
pub const CONTAINER_HOSTNAME: &str = "corral";

/// Guest exit code: the handshake channel refused or failed.
pub const EXIT_HANDSHAKE: i32 = 1;
/// Guest exit code: a mount or root-switch step failed.
pub const EXIT_FILESYSTEM: i32 = 2;
/// Guest exit code: hostname, network, identity, or session setup failed.
pub const EXIT_SETUP: i32 = 3;
/// Guest exit code: replacing the process image failed.
pub const EXIT_EXEC: i32 = 4;

/// Application name used in CLI output.
pub const APP_NAME: &str = "corral";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "corral";
