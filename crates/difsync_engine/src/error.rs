//! Error types for the sync engine.

use thiserror::Error;

use crate::endpoint::EndpointError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Inside a sync cycle these are logged and degraded, never propagated:
/// a failed exchange counts as an empty response and a failed endpoint
/// skips its document for that cycle. They surface to callers only from
/// configuration, registration and the one-shot download/upload calls.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Response was truncated or otherwise unusable.
    #[error("protocol error: {0}")]
    Protocol(#[from] difsync_protocol::ProtocolError),

    /// Endpoint callback failed.
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// A delta or patch could not be decoded.
    #[error("diff error: {0}")]
    Diff(#[from] difsync_diff::DiffError),

    /// The document is already registered with another session.
    #[error("document {id} is already shared by session {owner}")]
    AlreadyShared {
        /// Document id.
        id: String,
        /// Session id of the current owner.
        owner: String,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested document was not in the response.
    #[error("no text returned for document {0}")]
    MissingDocument(String),

    /// The background worker thread could not be started.
    #[error("failed to start sync worker: {0}")]
    Worker(#[source] std::io::Error),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Protocol(difsync_protocol::ProtocolError::Truncated { .. }) => true,
            _ => false,
        }
    }
}
