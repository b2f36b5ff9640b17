//! Property-based test generators using proptest.
//!
//! Texts deliberately include newlines, colons, percent signs and
//! non-ASCII characters, which all need escaping on the wire.

use proptest::prelude::*;

/// Strategy for generating valid document ids.
pub fn document_id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.-]{0,15}"
}

/// Strategy for generating valid session ids.
pub fn session_id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{8}"
}

/// Strategy for generating document texts.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-z ]{1,8}",
            1 => Just("\n".to_string()),
            1 => Just(":".to_string()),
            1 => Just("%".to_string()),
            1 => "[éßπ中😀]",
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

/// A local edit applied to a text by char offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    /// Insert text at a position.
    Insert {
        /// Char offset, clamped to the text length.
        at: usize,
        /// Inserted text.
        text: String,
    },
    /// Remove a range of chars.
    Remove {
        /// Char offset of the first removed char, clamped.
        at: usize,
        /// Number of chars to remove, clamped.
        len: usize,
    },
}

impl TextEdit {
    /// Applies the edit, clamping offsets to the text.
    pub fn apply(&self, text: &str) -> String {
        let mut chars: Vec<char> = text.chars().collect();
        match self {
            TextEdit::Insert { at, text } => {
                let at = (*at).min(chars.len());
                chars.splice(at..at, text.chars());
            }
            TextEdit::Remove { at, len } => {
                let at = (*at).min(chars.len());
                let end = (at + len).min(chars.len());
                chars.drain(at..end);
            }
        }
        chars.into_iter().collect()
    }
}

/// Strategy for generating a single edit.
pub fn text_edit_strategy() -> impl Strategy<Value = TextEdit> {
    prop_oneof![
        (0usize..64, "[a-z\n:]{1,6}").prop_map(|(at, text)| TextEdit::Insert { at, text }),
        (0usize..64, 1usize..8).prop_map(|(at, len)| TextEdit::Remove { at, len }),
    ]
}

/// Strategy for generating a sequence of edits.
pub fn text_edits_strategy(max: usize) -> impl Strategy<Value = Vec<TextEdit>> {
    prop::collection::vec(text_edit_strategy(), 0..max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_clamp_offsets() {
        let insert = TextEdit::Insert {
            at: 99,
            text: "!".into(),
        };
        assert_eq!(insert.apply("abc"), "abc!");

        let remove = TextEdit::Remove { at: 1, len: 99 };
        assert_eq!(remove.apply("abc"), "a");

        let remove = TextEdit::Remove { at: 5, len: 2 };
        assert_eq!(remove.apply("abc"), "abc");
    }

    #[test]
    fn edits_count_chars_not_bytes() {
        let insert = TextEdit::Insert {
            at: 1,
            text: "x".into(),
        };
        assert_eq!(insert.apply("éé"), "éxé");
    }

    proptest! {
        #[test]
        fn document_ids_are_nonempty(id in document_id_strategy()) {
            prop_assert!(!id.is_empty());
            prop_assert!(!id.contains(':'));
        }

        #[test]
        fn removal_never_grows(text in text_strategy(), at in 0usize..32, len in 0usize..8) {
            let out = TextEdit::Remove { at, len }.apply(&text);
            prop_assert!(out.chars().count() <= text.chars().count());
        }
    }
}
