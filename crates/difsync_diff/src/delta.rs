//! Compact tab-separated delta encoding of a diff.
//!
//! A delta lists operations against a known source text: `=n` keeps `n`
//! chars, `-n` drops `n` chars and `+text` inserts URI-encoded text.

use crate::diff::{Diff, Op};
use crate::error::{DiffError, DiffResult};
use crate::uri::{decode_uri, encode_uri};

/// Encodes a diff as a delta.
///
/// The delta carries no source text, only lengths, so it can only be
/// expanded against the exact text it was computed from.
pub fn to_delta(diffs: &[Diff]) -> String {
    let mut tokens = Vec::with_capacity(diffs.len());
    for diff in diffs {
        match diff.op {
            Op::Insert => tokens.push(format!("+{}", encode_uri(&diff.text))),
            Op::Delete => tokens.push(format!("-{}", diff.char_len())),
            Op::Equal => tokens.push(format!("={}", diff.char_len())),
        }
    }
    tokens.join("\t")
}

/// Expands a delta against its source text.
///
/// Fails if a token is malformed, if a length runs past the end of the
/// source, or if the delta does not cover the whole source.
pub fn from_delta(source: &str, delta: &str) -> DiffResult<Vec<Diff>> {
    let chars: Vec<char> = source.chars().collect();
    let mut diffs = Vec::new();
    let mut pointer = 0usize;

    for token in delta.split('\t') {
        if token.is_empty() {
            // Blank tokens are ok (from a trailing \t).
            continue;
        }
        let mut it = token.chars();
        let op = it.next().unwrap_or_default();
        let param = it.as_str();
        match op {
            '+' => diffs.push(Diff::insert(decode_uri(param)?)),
            '-' | '=' => {
                let n: usize = param
                    .parse()
                    .map_err(|_| DiffError::InvalidDeltaLength {
                        token: token.to_string(),
                    })?;
                let end = pointer + n;
                if end > chars.len() {
                    return Err(DiffError::DeltaLengthMismatch {
                        covered: end,
                        expected: chars.len(),
                    });
                }
                let text: String = chars[pointer..end].iter().collect();
                pointer = end;
                if op == '=' {
                    diffs.push(Diff::equal(text));
                } else {
                    diffs.push(Diff::delete(text));
                }
            }
            _ => {
                return Err(DiffError::InvalidDeltaOperation {
                    token: token.to_string(),
                })
            }
        }
    }

    if pointer != chars.len() {
        return Err(DiffError::DeltaLengthMismatch {
            covered: pointer,
            expected: chars.len(),
        });
    }
    Ok(diffs)
}
