//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while validating identifiers or parsing message bodies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A document identifier does not match the identifier grammar.
    #[error("illegal document id: {id:?}")]
    InvalidId {
        /// The rejected identifier.
        id: String,
    },

    /// A message body did not end with a blank line.
    ///
    /// The whole body is discarded; no line of it is processed.
    #[error("truncated message ({len} bytes without terminating blank line)")]
    Truncated {
        /// Length of the discarded body in bytes.
        len: usize,
    },
}

impl ProtocolError {
    /// Create an invalid id error.
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId { id: id.into() }
    }
}

/// Why a line of a message body was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The line has no `:` after its one-letter code.
    #[error("unparsable line")]
    NoSeparator,

    /// The code letter is not part of the protocol.
    #[error("unknown command {0:?}")]
    UnknownCode(char),

    /// A versioned command carries no version.
    #[error("no version number")]
    MissingVersion,

    /// A versioned command carries a version that is not a number.
    #[error("NaN version number")]
    InvalidVersion,

    /// Raw text could not be unescaped.
    #[error("illegal escape in raw text")]
    InvalidEscape,
}

/// A line that was ignored while parsing, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// The line as received.
    pub line: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::invalid_id("1abc");
        assert_eq!(err.to_string(), "illegal document id: \"1abc\"");

        let err = ProtocolError::Truncated { len: 12 };
        assert!(err.to_string().contains("12 bytes"));

        assert_eq!(SkipReason::UnknownCode('x').to_string(), "unknown command 'x'");
    }
}
