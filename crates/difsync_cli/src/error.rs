//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// Sync engine failure.
    #[error(transparent)]
    Sync(#[from] difsync_engine::SyncError),

    /// Invalid document id.
    #[error(transparent)]
    Protocol(#[from] difsync_protocol::ProtocolError),

    /// File access failed.
    #[error("{}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The state file could not be parsed or written.
    #[error("state file {}: {source}", .path.display())]
    State {
        /// State file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Command-line arguments that clap cannot check.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Wraps an I/O error with the file it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
