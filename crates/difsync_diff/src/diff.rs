//! Diff operations and the core diff routine.

use crate::cleanup::cleanup_merge;
use similar::{Algorithm, ChangeTag, TextDiff};
use std::time::Duration;

/// Time budget for a single diff computation.
///
/// Past the deadline the underlying Myers search returns a coarser but
/// still valid diff.
pub const DIFF_TIMEOUT: Duration = Duration::from_millis(500);

/// Both texts must be longer than this for the line-level pre-pass.
const LINE_MODE_THRESHOLD: usize = 100;

/// The kind of a diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Text present only in the source.
    Delete,
    /// Text present only in the target.
    Insert,
    /// Text present in both.
    Equal,
}

/// A single diff operation over a run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    /// The operation.
    pub op: Op,
    /// The text the operation covers.
    pub text: String,
}

impl Diff {
    /// Creates a diff operation.
    pub fn new(op: Op, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    /// Creates an equality.
    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(Op::Equal, text)
    }

    /// Creates an insertion.
    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(Op::Insert, text)
    }

    /// Creates a deletion.
    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(Op::Delete, text)
    }

    /// Length of the covered text in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Computes the difference between two texts.
///
/// Common prefix and suffix are split off first. When `line_mode` is set
/// and both remaining middles are long, the middles are diffed line by line
/// and every replaced run of lines is re-diffed by chars, which is much
/// faster on large documents at a small cost in minimality.
///
/// The result is merge-normalized: no empty operations and no two adjacent
/// operations of the same kind. Two empty texts produce no operations.
pub fn diff_main(text1: &str, text2: &str, line_mode: bool) -> Vec<Diff> {
    if text1 == text2 {
        if text1.is_empty() {
            return Vec::new();
        }
        return vec![Diff::equal(text1)];
    }

    let prefix = common_prefix(text1, text2);
    let (head, rest1) = text1.split_at(prefix);
    let rest2 = &text2[prefix..];
    let suffix = common_suffix(rest1, rest2);
    let (middle1, tail) = rest1.split_at(rest1.len() - suffix);
    let middle2 = &rest2[..rest2.len() - suffix];

    let mut diffs = Vec::new();
    if !head.is_empty() {
        diffs.push(Diff::equal(head));
    }
    if line_mode
        && middle1.chars().count() > LINE_MODE_THRESHOLD
        && middle2.chars().count() > LINE_MODE_THRESHOLD
    {
        diffs.extend(diff_lines(middle1, middle2));
    } else {
        diffs.extend(diff_chars(middle1, middle2));
    }
    if !tail.is_empty() {
        diffs.push(Diff::equal(tail));
    }

    cleanup_merge(&mut diffs);
    diffs
}

fn diff_chars(text1: &str, text2: &str) -> Vec<Diff> {
    if text1.is_empty() {
        return if text2.is_empty() {
            Vec::new()
        } else {
            vec![Diff::insert(text2)]
        };
    }
    if text2.is_empty() {
        return vec![Diff::delete(text1)];
    }

    let mut config = TextDiff::configure();
    config.algorithm(Algorithm::Myers).timeout(DIFF_TIMEOUT);
    let diff = config.diff_chars(text1, text2);

    let mut diffs = Vec::new();
    for change in diff.iter_all_changes() {
        push_run(&mut diffs, op_for(change.tag()), change.value());
    }
    diffs
}

fn diff_lines(text1: &str, text2: &str) -> Vec<Diff> {
    let mut config = TextDiff::configure();
    config.algorithm(Algorithm::Myers).timeout(DIFF_TIMEOUT);
    let diff = config.diff_lines(text1, text2);

    let mut diffs = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => deleted.push_str(change.value()),
            ChangeTag::Insert => inserted.push_str(change.value()),
            ChangeTag::Equal => {
                flush_replacement(&mut diffs, &mut deleted, &mut inserted);
                push_run(&mut diffs, Op::Equal, change.value());
            }
        }
    }
    flush_replacement(&mut diffs, &mut deleted, &mut inserted);
    diffs
}

/// Re-diffs a replaced block of lines by chars.
fn flush_replacement(diffs: &mut Vec<Diff>, deleted: &mut String, inserted: &mut String) {
    if deleted.is_empty() && inserted.is_empty() {
        return;
    }
    for diff in diff_chars(deleted, inserted) {
        push_run(diffs, diff.op, &diff.text);
    }
    deleted.clear();
    inserted.clear();
}

fn push_run(diffs: &mut Vec<Diff>, op: Op, text: &str) {
    if text.is_empty() {
        return;
    }
    match diffs.last_mut() {
        Some(last) if last.op == op => last.text.push_str(text),
        _ => diffs.push(Diff::new(op, text)),
    }
}

fn op_for(tag: ChangeTag) -> Op {
    match tag {
        ChangeTag::Equal => Op::Equal,
        ChangeTag::Delete => Op::Delete,
        ChangeTag::Insert => Op::Insert,
    }
}

/// Byte length of the common prefix, always on a char boundary.
pub(crate) fn common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Byte length of the common suffix, always on a char boundary.
pub(crate) fn common_suffix(a: &str, b: &str) -> usize {
    a.char_indices()
        .rev()
        .zip(b.chars().rev())
        .find(|((_, x), y)| x != y)
        .map(|((i, c), _)| a.len() - (i + c.len_utf8()))
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Reconstructs the source text of a diff.
pub fn text1<'a>(diffs: impl IntoIterator<Item = &'a Diff>) -> String {
    diffs
        .into_iter()
        .filter(|d| d.op != Op::Insert)
        .map(|d| d.text.as_str())
        .collect()
}

/// Reconstructs the target text of a diff.
pub fn text2<'a>(diffs: impl IntoIterator<Item = &'a Diff>) -> String {
    diffs
        .into_iter()
        .filter(|d| d.op != Op::Delete)
        .map(|d| d.text.as_str())
        .collect()
}

/// Returns true if the diff changes nothing.
pub fn is_noop(diffs: &[Diff]) -> bool {
    diffs.iter().all(|d| d.op == Op::Equal)
}

/// Number of inserted, deleted or substituted chars.
pub fn levenshtein(diffs: &[Diff]) -> usize {
    let mut distance = 0;
    let mut insertions = 0;
    let mut deletions = 0;
    for diff in diffs {
        match diff.op {
            Op::Insert => insertions += diff.char_len(),
            Op::Delete => deletions += diff.char_len(),
            Op::Equal => {
                // A deletion and an insertion is one substitution.
                distance += insertions.max(deletions);
                insertions = 0;
                deletions = 0;
            }
        }
    }
    distance + insertions.max(deletions)
}

/// Translates a char offset in the source text to the target text.
///
/// An offset inside a deletion maps to the start of that deletion.
pub fn x_index(diffs: &[Diff], loc: usize) -> usize {
    let mut chars1 = 0;
    let mut chars2 = 0;
    let mut last_chars1 = 0;
    let mut last_chars2 = 0;
    let mut hit = None;
    for diff in diffs {
        let len = diff.char_len();
        if diff.op != Op::Insert {
            chars1 += len;
        }
        if diff.op != Op::Delete {
            chars2 += len;
        }
        if chars1 > loc {
            hit = Some(diff.op);
            break;
        }
        last_chars1 = chars1;
        last_chars2 = chars2;
    }
    if hit == Some(Op::Delete) {
        return last_chars2;
    }
    last_chars2 + (loc - last_chars1)
}
