//! Error types for the diff crate.

use thiserror::Error;

/// Result type for diff operations.
pub type DiffResult<T> = Result<T, DiffError>;

/// Errors that can occur while decoding deltas or patch text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// A delta token started with an unknown operator.
    #[error("invalid delta operation in token {token:?}")]
    InvalidDeltaOperation {
        /// The offending token.
        token: String,
    },

    /// A `=` or `-` token did not carry a valid length.
    #[error("invalid length in delta token {token:?}")]
    InvalidDeltaLength {
        /// The offending token.
        token: String,
    },

    /// The delta does not cover the source text exactly.
    #[error("delta covers {covered} chars but source text has {expected}")]
    DeltaLengthMismatch {
        /// Number of source chars consumed by the delta.
        covered: usize,
        /// Number of chars in the source text.
        expected: usize,
    },

    /// A percent escape could not be decoded to UTF-8.
    #[error("invalid escape sequence in {text:?}")]
    InvalidEscape {
        /// The undecodable text.
        text: String,
    },

    /// Patch text could not be parsed.
    #[error("invalid patch text: {message}")]
    InvalidPatch {
        /// Description of the parse failure.
        message: String,
    },
}

impl DiffError {
    /// Create an invalid escape error.
    pub fn invalid_escape(text: impl Into<String>) -> Self {
        Self::InvalidEscape { text: text.into() }
    }

    /// Create an invalid patch error.
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DiffError::DeltaLengthMismatch {
            covered: 3,
            expected: 5,
        };
        assert_eq!(err.to_string(), "delta covers 3 chars but source text has 5");

        let err = DiffError::invalid_patch("missing header");
        assert!(err.to_string().contains("missing header"));
    }
}
