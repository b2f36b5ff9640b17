//! URI-style escaping used for inserted text in deltas and patches.
//!
//! The escaping matches JavaScript's `encodeURI` so that deltas stay
//! readable: spaces and most punctuation pass through, while newlines,
//! tabs, `%` and non-ASCII chars are percent-encoded as UTF-8.

use crate::error::{DiffError, DiffResult};

/// Chars that `encodeURI` leaves alone beyond ASCII alphanumerics.
const UNRESERVED: &str = " !~*'();/?:@&=+$,#-_.";

/// Escapes text for a delta or patch body.
pub fn encode_uri(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || UNRESERVED.contains(c) {
            out.push(c);
        } else {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Reverses [`encode_uri`].
///
/// Every `%` must start a two-digit hex escape and the escaped bytes must
/// form valid UTF-8.
pub fn decode_uri(text: &str) -> DiffResult<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(DiffError::invalid_escape(text));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DiffError::invalid_escape(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_readable_punctuation() {
        assert_eq!(
            encode_uri("A-Z a-z 0-9 - _ . ! ~ * ' ( ) ; / ? : @ & = + $ , #"),
            "A-Z a-z 0-9 - _ . ! ~ * ' ( ) ; / ? : @ & = + $ , #"
        );
    }

    #[test]
    fn escapes_control_and_non_ascii() {
        assert_eq!(encode_uri("a\nb\tc%"), "a%0Ab%09c%25");
        assert_eq!(encode_uri("\u{0680}"), "%DA%80");
        assert_eq!(encode_uri("`[]"), "%60%5B%5D");
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(decode_uri("a%0Ab%09c%25").unwrap(), "a\nb\tc%");
        assert_eq!(decode_uri("%DA%80 +").unwrap(), "\u{0680} +");
    }

    #[test]
    fn rejects_bad_escapes() {
        assert!(decode_uri("%").is_err());
        assert!(decode_uri("abc%4").is_err());
        assert!(decode_uri("%zz").is_err());
        // Lone continuation byte is not UTF-8.
        assert!(decode_uri("%80").is_err());
    }
}
