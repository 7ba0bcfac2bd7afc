//! Unified error types for the Corral workspace.
//!
//! Syscall-level failures carry the name of the failing operation together
//! with the underlying OS error so callers can propagate them without
//! losing the point of failure.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CorralError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A privileged kernel operation failed.
    #[error("{op} failed: {source}")]
    Syscall {
        /// Name of the failing operation.
        op: &'static str,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An external privileged helper command failed.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Helper {
        /// The command line that was run.
        command: String,
        /// Exit status of the helper, or -1 when killed by a signal.
        status: i32,
        /// Captured standard error output.
        stderr: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The registry file length is not a whole number of records.
    #[error("registry {path} is corrupt: {size} bytes is not a multiple of the record width")]
    CorruptRegistry {
        /// Path of the registry file.
        path: PathBuf,
        /// Observed file size in bytes.
        size: u64,
    },
}

impl CorralError {
    /// Builds a [`CorralError::Syscall`] from an operation name and any
    /// error convertible into an OS-level error (such as `nix::Errno`).
    pub fn syscall(op: &'static str, source: impl Into<std::io::Error>) -> Self {
        Self::Syscall {
            op,
            source: source.into(),
        }
    }

    /// Builds a [`CorralError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`CorralError::Config`] from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CorralError>;
