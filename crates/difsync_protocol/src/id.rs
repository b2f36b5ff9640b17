//! Document identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

static ID_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][-.:0-9A-Za-z_]*$"));

/// Identifier of a shared document.
///
/// Starts with an ASCII letter, followed by letters, digits and any of
/// `- . : _`. The wire form is the identifier prefixed with the session's
/// namespace prefix, which is not part of the identifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Validates and wraps an identifier.
    pub fn parse(id: impl Into<String>) -> ProtocolResult<Self> {
        let id = id.into();
        if is_valid_id(&id) {
            Ok(Self(id))
        } else {
            Err(ProtocolError::InvalidId { id })
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as sent on the wire under `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

/// Returns true if `id` matches the identifier grammar.
pub fn is_valid_id(id: &str) -> bool {
    match &*ID_PATTERN {
        Ok(pattern) => pattern.is_match(id),
        Err(_) => false,
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocumentId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ProtocolError;

    fn try_from(value: String) -> ProtocolResult<Self> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for DocumentId {
    type Error = ProtocolError;

    fn try_from(value: &str) -> ProtocolResult<Self> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_ids() {
        for id in ["abc-1:2", "a", "Doc.v2_final", "x:y:z"] {
            assert!(DocumentId::parse(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn rejects_invalid_ids() {
        for id in ["1abc", "", "-a", "a b", "a/b", "ümlaut", "a\n"] {
            assert!(
                matches!(DocumentId::parse(id), Err(ProtocolError::InvalidId { .. })),
                "{id:?}"
            );
        }
    }

    #[test]
    fn prefix_is_only_on_the_wire() {
        let id = DocumentId::parse("notes").unwrap();
        assert_eq!(id.with_prefix("app_"), "app_notes");
        assert_eq!(id.as_str(), "notes");
        assert_eq!(id.to_string(), "notes");
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn generated_ids_parse(id in "[A-Za-z][-.:0-9A-Za-z_]{0,20}") {
                prop_assert!(DocumentId::parse(id).is_ok());
            }

            #[test]
            fn leading_non_letter_rejected(id in "[-.:0-9_][-.:0-9A-Za-z_]{0,20}") {
                prop_assert!(DocumentId::parse(id).is_err());
            }
        }
    }
}
