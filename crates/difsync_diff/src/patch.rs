//! Patches: diffs with surrounding context, applied fuzzily.

use std::collections::VecDeque;
use std::fmt;

use crate::diff::{diff_main, levenshtein, text1, text2, x_index, Diff, Op};
use crate::error::{DiffError, DiffResult};
use crate::matcher::{find_from, match_chars, rfind_until, MATCH_MAX_BITS};
use crate::uri::{decode_uri, encode_uri};

/// Chunk size for context length, in chars.
pub const PATCH_MARGIN: usize = 4;

/// When deleting a large block of text (over ~64 chars), how close do the
/// contents have to be to match the expected contents.
pub const PATCH_DELETE_THRESHOLD: f64 = 0.5;

/// One hunk of edits anchored in its source text.
///
/// `start1`/`length1` describe the span in the source text and
/// `start2`/`length2` the span in the target text, all in chars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    /// Operations including the leading and trailing context.
    pub diffs: Vec<Diff>,
    /// Start of the hunk in the source text.
    pub start1: usize,
    /// Start of the hunk in the target text.
    pub start2: usize,
    /// Length of the hunk in the source text.
    pub length1: usize,
    /// Length of the hunk in the target text.
    pub length2: usize,
}

impl Patch {
    /// The text this patch expects to find (context, equalities and deletions).
    pub fn source_text(&self) -> String {
        text1(&self.diffs)
    }

    /// The text this patch produces.
    pub fn target_text(&self) -> String {
        text2(&self.diffs)
    }
}

fn coords(start: usize, length: usize) -> String {
    match length {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, length),
    }
}

impl fmt::Display for Patch {
    /// GNU diff style: `@@ -382,8 +481,9 @@` followed by one line per op.
    /// Indices are printed 1-based.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{} +{} @@",
            coords(self.start1, self.length1),
            coords(self.start2, self.length2)
        )?;
        for diff in &self.diffs {
            let sign = match diff.op {
                Op::Insert => '+',
                Op::Delete => '-',
                Op::Equal => ' ',
            };
            writeln!(f, "{sign}{}", encode_uri(&diff.text))?;
        }
        Ok(())
    }
}

/// Builds a list of patches that turn `text1` into the target of `diffs`.
///
/// `diffs` must have been computed against `text1`.
pub fn patch_make(text1: &str, diffs: &[Diff]) -> Vec<Patch> {
    let mut patches = Vec::new();
    if diffs.is_empty() {
        return patches;
    }

    let mut patch = Patch::default();
    let mut char_count1 = 0;
    let mut char_count2 = 0;
    // Context is derived from the text as it stands before each patch,
    // which is the target of all earlier patches.
    let mut prepatch: Vec<char> = text1.chars().collect();
    let mut postpatch = prepatch.clone();

    for (i, diff) in diffs.iter().enumerate() {
        let len = diff.char_len();
        if patch.diffs.is_empty() && diff.op != Op::Equal {
            patch.start1 = char_count1;
            patch.start2 = char_count2;
        }

        match diff.op {
            Op::Insert => {
                patch.diffs.push(diff.clone());
                patch.length2 += len;
                let at = char_count2.min(postpatch.len());
                postpatch.splice(at..at, diff.text.chars());
            }
            Op::Delete => {
                patch.length1 += len;
                patch.diffs.push(diff.clone());
                let at = char_count2.min(postpatch.len());
                let end = (char_count2 + len).min(postpatch.len());
                postpatch.drain(at..end);
            }
            Op::Equal => {
                if len <= 2 * PATCH_MARGIN && !patch.diffs.is_empty() && i != diffs.len() - 1 {
                    // Small equality inside a patch.
                    patch.diffs.push(diff.clone());
                    patch.length1 += len;
                    patch.length2 += len;
                }
                if len >= 2 * PATCH_MARGIN && !patch.diffs.is_empty() {
                    // Time for a new patch.
                    add_context(&mut patch, &prepatch);
                    patches.push(std::mem::take(&mut patch));
                    prepatch = postpatch.clone();
                    char_count1 = char_count2;
                }
            }
        }

        if diff.op != Op::Insert {
            char_count1 += len;
        }
        if diff.op != Op::Delete {
            char_count2 += len;
        }
    }

    if !patch.diffs.is_empty() {
        add_context(&mut patch, &prepatch);
        patches.push(patch);
    }
    patches
}

/// Grows the context around a patch until its source is unique in `text`,
/// within the bitap limit.
fn add_context(patch: &mut Patch, text: &[char]) {
    if text.is_empty() {
        return;
    }
    let span = |lo: usize, hi: usize| {
        let hi = hi.min(text.len());
        &text[lo.min(hi)..hi]
    };

    let mut pattern = span(patch.start2, patch.start2 + patch.length1);
    let mut padding = 0;
    while find_from(text, pattern, 0) != rfind_until(text, pattern, text.len())
        && pattern.len() < MATCH_MAX_BITS - 2 * PATCH_MARGIN
    {
        padding += PATCH_MARGIN;
        pattern = span(
            patch.start2.saturating_sub(padding),
            patch.start2 + patch.length1 + padding,
        );
    }
    // One more chunk for good luck.
    padding += PATCH_MARGIN;

    let prefix = span(patch.start2.saturating_sub(padding), patch.start2);
    if !prefix.is_empty() {
        patch.diffs.insert(0, Diff::equal(prefix.iter().collect::<String>()));
    }
    let suffix = span(
        patch.start2 + patch.length1,
        patch.start2 + patch.length1 + padding,
    );
    if !suffix.is_empty() {
        patch.diffs.push(Diff::equal(suffix.iter().collect::<String>()));
    }

    patch.start1 = patch.start1.saturating_sub(prefix.len());
    patch.start2 -= prefix.len();
    patch.length1 += prefix.len() + suffix.len();
    patch.length2 += prefix.len() + suffix.len();
}

/// Adds sentinel padding to the first and last patch so edits at the very
/// edges of the text can still be located.
///
/// Returns the padding string; the text the patches are applied to must be
/// wrapped in it on both ends.
pub fn patch_add_padding(patches: &mut [Patch]) -> String {
    let padding: String = (1..=PATCH_MARGIN as u8).map(char::from).collect();
    let pad_len = PATCH_MARGIN;

    for patch in patches.iter_mut() {
        patch.start1 += pad_len;
        patch.start2 += pad_len;
    }

    if let Some(patch) = patches.first_mut() {
        let len = match patch.diffs.first() {
            Some(first) if first.op == Op::Equal => Some(first.char_len()),
            _ => None,
        };
        match len {
            None => {
                patch.diffs.insert(0, Diff::equal(padding.clone()));
                patch.start1 -= pad_len;
                patch.start2 -= pad_len;
                patch.length1 += pad_len;
                patch.length2 += pad_len;
            }
            Some(len) if pad_len > len => {
                // Grow first equality.
                let extra = pad_len - len;
                patch.diffs[0].text.insert_str(0, &padding[len..]);
                patch.start1 -= extra;
                patch.start2 -= extra;
                patch.length1 += extra;
                patch.length2 += extra;
            }
            Some(_) => {}
        }
    }

    if let Some(patch) = patches.last_mut() {
        let len = match patch.diffs.last() {
            Some(last) if last.op == Op::Equal => Some(last.char_len()),
            _ => None,
        };
        match len {
            None => {
                patch.diffs.push(Diff::equal(padding.clone()));
                patch.length1 += pad_len;
                patch.length2 += pad_len;
            }
            Some(len) if pad_len > len => {
                // Grow last equality.
                let extra = pad_len - len;
                if let Some(last) = patch.diffs.last_mut() {
                    last.text.push_str(&padding[..extra]);
                }
                patch.length1 += extra;
                patch.length2 += extra;
            }
            Some(_) => {}
        }
    }

    padding
}

/// Breaks up any patch whose source is longer than the bitap limit.
pub fn patch_split_max(patches: &mut Vec<Patch>) {
    let patch_size = MATCH_MAX_BITS;
    let mut x = 0;
    while x < patches.len() {
        if patches[x].length1 <= patch_size {
            x += 1;
            continue;
        }
        let bigpatch = patches.remove(x);
        let mut start1 = bigpatch.start1;
        let mut start2 = bigpatch.start2;
        let mut diffs: VecDeque<Diff> = bigpatch.diffs.into();
        let mut precontext: Vec<char> = Vec::new();

        while !diffs.is_empty() {
            // Create one of several smaller patches.
            let mut patch = Patch {
                start1: start1.saturating_sub(precontext.len()),
                start2: start2.saturating_sub(precontext.len()),
                ..Patch::default()
            };
            let mut empty = true;
            if !precontext.is_empty() {
                patch.length1 = precontext.len();
                patch.length2 = precontext.len();
                patch.diffs.push(Diff::equal(precontext.iter().collect::<String>()));
            }

            while patch.length1 < patch_size - PATCH_MARGIN {
                let Some((op, len)) = diffs.front().map(|d| (d.op, d.char_len())) else {
                    break;
                };
                let first_is_context =
                    patch.diffs.len() == 1 && patch.diffs[0].op == Op::Equal;
                if op == Op::Insert {
                    // Insertions are harmless.
                    patch.length2 += len;
                    start2 += len;
                    patch.diffs.extend(diffs.pop_front());
                    empty = false;
                } else if op == Op::Delete && first_is_context && len > 2 * patch_size {
                    // This is a large deletion. Let it pass in one chunk.
                    patch.length1 += len;
                    start1 += len;
                    patch.diffs.extend(diffs.pop_front());
                    empty = false;
                } else {
                    // Deletion or equality. Only take as much as we can stomach.
                    let take = len.min(patch_size - patch.length1 - PATCH_MARGIN);
                    patch.length1 += take;
                    start1 += take;
                    if op == Op::Equal {
                        patch.length2 += take;
                        start2 += take;
                    } else {
                        empty = false;
                    }
                    let head = if take < len {
                        match diffs.front_mut() {
                            Some(front) => {
                                let split = front
                                    .text
                                    .char_indices()
                                    .nth(take)
                                    .map_or(front.text.len(), |(i, _)| i);
                                let rest = front.text.split_off(split);
                                std::mem::replace(&mut front.text, rest)
                            }
                            None => String::new(),
                        }
                    } else {
                        diffs.pop_front().map(|d| d.text).unwrap_or_default()
                    };
                    patch.diffs.push(Diff::new(op, head));
                }
            }

            // Compute the head context for the next patch.
            let target: Vec<char> = text2(&patch.diffs).chars().collect();
            precontext = target[target.len().saturating_sub(PATCH_MARGIN)..].to_vec();

            // Append the end context for this patch.
            let postcontext: String = text1(diffs.iter())
                .chars()
                .take(PATCH_MARGIN)
                .collect();
            if !postcontext.is_empty() {
                let len = postcontext.chars().count();
                patch.length1 += len;
                patch.length2 += len;
                match patch.diffs.last_mut() {
                    Some(last) if last.op == Op::Equal => last.text.push_str(&postcontext),
                    _ => patch.diffs.push(Diff::equal(postcontext)),
                }
            }

            if !empty {
                patches.insert(x, patch);
                x += 1;
            }
        }
    }
}

/// Where a patch source was found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Char offset of the match.
    pub start: usize,
    /// For sources longer than the bitap limit, the offset where the
    /// source's tail was found.
    pub end: Option<usize>,
}

impl Location {
    /// The chars of `text` covered by this location for a source of
    /// `source_len` chars.
    pub fn window<'a>(&self, text: &'a [char], source_len: usize) -> &'a [char] {
        let hi = match self.end {
            Some(end) => end + MATCH_MAX_BITS,
            None => self.start + source_len,
        };
        let hi = hi.min(text.len());
        &text[self.start.min(hi)..hi]
    }
}

/// Fuzzily locates a patch source in `text` near `expected`.
///
/// Sources longer than the bitap limit are located by head and tail
/// separately, and the head must come first.
pub fn locate(text: &[char], source: &[char], expected: usize) -> Option<Location> {
    if source.len() > MATCH_MAX_BITS {
        let start = match_chars(text, &source[..MATCH_MAX_BITS], expected)?;
        let end = match_chars(
            text,
            &source[source.len() - MATCH_MAX_BITS..],
            expected + source.len() - MATCH_MAX_BITS,
        )?;
        if start >= end {
            return None;
        }
        Some(Location {
            start,
            end: Some(end),
        })
    } else {
        match_chars(text, source, expected).map(|start| Location { start, end: None })
    }
}

/// Applies patches to a text, tolerating drift and minor differences.
///
/// Returns the patched text and, per applied patch, whether it was
/// applied. Patches are padded and split internally, so the flags refer to
/// the split list.
pub fn patch_apply(patches: &[Patch], text: &str) -> (String, Vec<bool>) {
    if patches.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let mut patches = patches.to_vec();
    let padding = patch_add_padding(&mut patches);
    let pad_len = padding.chars().count();
    let mut chars: Vec<char> = padding
        .chars()
        .chain(text.chars())
        .chain(padding.chars())
        .collect();
    patch_split_max(&mut patches);

    // Offset between where a patch was expected and where it was found.
    let mut drift: isize = 0;
    let mut results = Vec::with_capacity(patches.len());

    for patch in &patches {
        let expected = (patch.start2 as isize + drift).max(0) as usize;
        let source: Vec<char> = patch.source_text().chars().collect();

        let Some(location) = locate(&chars, &source, expected) else {
            // No match found. Subtract the delta for this failed patch
            // from subsequent patches.
            results.push(false);
            drift -= patch.length2 as isize - patch.length1 as isize;
            continue;
        };

        drift = location.start as isize - expected as isize;
        let window = location.window(&chars, source.len());
        if window == source.as_slice() {
            let start = location.start;
            let end = (start + source.len()).min(chars.len());
            chars.splice(start..end, patch.target_text().chars());
            results.push(true);
            continue;
        }

        // Imperfect match. Run a diff to get a framework of equivalent indices.
        let source_str: String = source.iter().collect();
        let window_str: String = window.iter().collect();
        let diffs = diff_main(&source_str, &window_str, false);
        if source.len() > MATCH_MAX_BITS
            && levenshtein(&diffs) as f64 / source.len() as f64 > PATCH_DELETE_THRESHOLD
        {
            // The end points match, but the content is unacceptably bad.
            results.push(false);
            continue;
        }

        let mut index1 = 0;
        for diff in &patch.diffs {
            let len = diff.char_len();
            match diff.op {
                Op::Insert => {
                    let at = (location.start + x_index(&diffs, index1)).min(chars.len());
                    chars.splice(at..at, diff.text.chars());
                }
                Op::Delete => {
                    let at = (location.start + x_index(&diffs, index1)).min(chars.len());
                    let end = (location.start + x_index(&diffs, index1 + len))
                        .clamp(at, chars.len());
                    chars.drain(at..end);
                }
                Op::Equal => {}
            }
            if diff.op != Op::Delete {
                index1 += len;
            }
        }
        results.push(true);
    }

    let inner = chars
        .get(pad_len..chars.len().saturating_sub(pad_len))
        .unwrap_or(&[]);
    (inner.iter().collect(), results)
}

/// Renders patches in their textual form.
pub fn patches_to_text(patches: &[Patch]) -> String {
    patches.iter().map(Patch::to_string).collect()
}

/// Parses the textual form produced by [`patches_to_text`].
pub fn patches_from_text(text: &str) -> DiffResult<Vec<Patch>> {
    let mut patches = Vec::new();
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }
        let mut patch = parse_header(line)?;
        while let Some(&body) = lines.peek() {
            if body.starts_with('@') {
                break;
            }
            lines.next();
            let mut it = body.chars();
            let Some(sign) = it.next() else {
                // Blank line? Whatever.
                continue;
            };
            let text = decode_uri(it.as_str())?;
            let op = match sign {
                '-' => Op::Delete,
                '+' => Op::Insert,
                ' ' => Op::Equal,
                other => {
                    return Err(DiffError::invalid_patch(format!(
                        "invalid patch mode {other:?} in {body:?}"
                    )))
                }
            };
            patch.diffs.push(Diff::new(op, text));
        }
        patches.push(patch);
    }
    Ok(patches)
}

fn parse_header(line: &str) -> DiffResult<Patch> {
    let invalid = || DiffError::invalid_patch(format!("invalid patch string: {line:?}"));
    let inner = line
        .strip_prefix("@@ -")
        .and_then(|rest| rest.strip_suffix(" @@"))
        .ok_or_else(invalid)?;
    let (left, right) = inner.split_once(" +").ok_or_else(invalid)?;
    let (start1, length1) = parse_coords(left).ok_or_else(invalid)?;
    let (start2, length2) = parse_coords(right).ok_or_else(invalid)?;
    Ok(Patch {
        diffs: Vec::new(),
        start1,
        start2,
        length1,
        length2,
    })
}

/// Parses `a` or `a,b` into a 0-based start and a length.
fn parse_coords(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        None => {
            let start: usize = s.parse().ok()?;
            Some((start.checked_sub(1)?, 1))
        }
        Some((start, "0")) => Some((start.parse().ok()?, 0)),
        Some((start, len)) => {
            let start: usize = start.parse().ok()?;
            Some((start.checked_sub(1)?, len.parse().ok()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{cleanup_efficiency, cleanup_semantic};

    fn make(a: &str, b: &str) -> Vec<Patch> {
        let mut diffs = diff_main(a, b, true);
        if diffs.len() > 2 {
            cleanup_semantic(&mut diffs);
            cleanup_efficiency(&mut diffs);
        }
        patch_make(a, &diffs)
    }

    #[test]
    fn make_adds_context() {
        let patches = make(
            "The quick brown fox jumps over the lazy dog.",
            "The quick brown fox leaps over the lazy dog.",
        );
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches_to_text(&patches),
            "@@ -17,11 +17,11 @@\n fox \n-jum\n+lea\n ps o\n"
        );
    }

    #[test]
    fn make_from_empty_diff() {
        assert!(patch_make("abc", &[]).is_empty());
    }

    #[test]
    fn apply_to_source_yields_target() {
        let a = "The quick brown fox jumps over the lazy dog.";
        let b = "That quick brown fox jumped over a lazy dog.";
        let patches = make(a, b);
        let (text, results) = patch_apply(&patches, a);
        assert_eq!(text, b);
        assert!(results.iter().all(|r| *r));
    }

    #[test]
    fn apply_tolerates_drift_and_foreign_edits() {
        let patches = make(
            "The quick brown fox jumps over the lazy dog.",
            "The quick brown fox leaps over the lazy dog.",
        );
        let (text, results) =
            patch_apply(&patches, "A quick brown fox jumps over the lazy cat.");
        assert_eq!(text, "A quick brown fox leaps over the lazy cat.");
        assert_eq!(results, vec![true]);

        let (text, _) = patch_apply(
            &patches,
            "Well. The quick brown fox jumps over the lazy dog.",
        );
        assert_eq!(text, "Well. The quick brown fox leaps over the lazy dog.");
    }

    #[test]
    fn apply_reports_missing_context() {
        let patches = make(
            "The quick brown fox jumps over the lazy dog.",
            "The quick brown fox leaps over the lazy dog.",
        );
        let (text, results) = patch_apply(&patches, "completely unrelated");
        assert_eq!(text, "completely unrelated");
        assert_eq!(results, vec![false]);
    }

    #[test]
    fn apply_at_the_edges() {
        let patches = make("", "test");
        assert_eq!(patch_apply(&patches, ""), ("test".to_string(), vec![true]));

        let patches = make("XY", "XtestY");
        assert_eq!(
            patch_apply(&patches, "XY"),
            ("XtestY".to_string(), vec![true])
        );

        let patches = make("y", "y123");
        assert_eq!(
            patch_apply(&patches, "x"),
            ("x123".to_string(), vec![true])
        );
    }

    #[test]
    fn padding_wraps_edge_patches() {
        let mut patches = make("", "test");
        assert_eq!(patches_to_text(&patches), "@@ -0,0 +1,4 @@\n+test\n");
        let padding = patch_add_padding(&mut patches);
        assert_eq!(padding, "\u{1}\u{2}\u{3}\u{4}");
        assert_eq!(
            patches_to_text(&patches),
            "@@ -1,8 +1,12 @@\n %01%02%03%04\n+test\n %01%02%03%04\n"
        );
    }

    #[test]
    fn split_respects_bitap_limit() {
        let a = "abcdefghijklmnopqrstuvwxyz01234567890";
        let b = "XabXcdXefXghXijXklXmnXopXqrXstXuvXwxXyzX01X23X45X67X89X0";
        let mut patches = make(a, b);
        patch_split_max(&mut patches);
        assert!(patches.len() > 1);
        assert!(patches.iter().all(|p| p.length1 <= MATCH_MAX_BITS));
        let (text, results) = patch_apply(&patches, a);
        assert_eq!(text, b);
        assert!(results.iter().all(|r| *r));
    }

    #[test]
    fn text_form_round_trip() {
        let text = "@@ -21,18 +22,17 @@\n jump\n-s\n+ed\n  over \n-the\n+a\n %0Alaz\n";
        let patches = patches_from_text(text).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].start1, 20);
        assert_eq!(patches[0].length1, 18);
        assert_eq!(patches[0].diffs[6], Diff::equal("\nlaz"));
        assert_eq!(patches_to_text(&patches), text);

        for text in ["@@ -1 +1 @@\n-a\n+b\n", "@@ -0,0 +1,3 @@\n+abc\n"] {
            assert_eq!(patches_to_text(&patches_from_text(text).unwrap()), text);
        }
        assert!(patches_from_text("").unwrap().is_empty());
    }

    #[test]
    fn text_form_rejects_garbage() {
        assert!(patches_from_text("Bad\nPatch\n").is_err());
        assert!(patches_from_text("@@ -1 +1 @@\n*a\n").is_err());
    }
}
