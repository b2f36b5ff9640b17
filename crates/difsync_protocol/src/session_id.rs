//! Session id alphabet.
//!
//! Ids are short because they are sent with every request. The first char
//! is a lowercase letter; `--` never appears so an id can be embedded in
//! an HTML comment.

/// Length of a generated session id.
pub const SESSION_ID_LEN: usize = 8;

/// Chars allowed in the first position.
pub const SESSION_ID_HEAD: &str = "abcdefghijklmnopqrstuvwxyz";

/// Chars allowed after the first position.
pub const SESSION_ID_TAIL: &str = "abcdefghijklmnopqrstuvwxyz0123456789-_:.";

/// Returns true if `id` could have been produced by a session id generator.
pub fn is_valid_session_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    SESSION_ID_HEAD.contains(first)
        && chars.all(|c| SESSION_ID_TAIL.contains(c))
        && !id.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_alphabet() {
        assert!(is_valid_session_id("abc12:_."));
        assert!(is_valid_session_id("a-b-c-d"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("1abcdefg"));
        assert!(!is_valid_session_id("Abcdefgh"));
        assert!(!is_valid_session_id("ab--cdef"));
        assert!(!is_valid_session_id("abc def"));
    }
}
