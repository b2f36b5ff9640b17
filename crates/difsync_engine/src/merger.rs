//! Cursor-preserving patch application.
//!
//! Remote edits are applied to a live buffer one insertion or deletion at a
//! time instead of replacing the whole text, so that tracked offsets such as
//! the caret and the selection can be carried across the edit.

use difsync_diff::{
    diff_main, levenshtein, locate, patch_add_padding, patch_split_max, x_index, Op, Patch,
    MATCH_MAX_BITS, PATCH_DELETE_THRESHOLD,
};
use tracing::{debug, trace};

use crate::endpoint::{EndpointResult, LiveBuffer};

/// Per-patch outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Whether each patch (after splitting) was applied.
    pub results: Vec<bool>,
}

impl MergeReport {
    /// Number of applied patches.
    pub fn applied(&self) -> usize {
        self.results.iter().filter(|r| **r).count()
    }

    /// Number of dropped patches.
    pub fn rejected(&self) -> usize {
        self.results.len() - self.applied()
    }

    /// True if every patch applied.
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| *r)
    }
}

/// Keeps the buffer read-only for its lifetime.
struct EditLock<'a> {
    buffer: &'a mut dyn LiveBuffer,
}

impl<'a> EditLock<'a> {
    fn new(buffer: &'a mut dyn LiveBuffer) -> Self {
        buffer.set_editable(false);
        Self { buffer }
    }
}

impl Drop for EditLock<'_> {
    fn drop(&mut self) {
        self.buffer.set_editable(true);
    }
}

/// Applies patch lists to live buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchMerger;

impl PatchMerger {
    /// Applies `patches` to `buffer`, adjusting `offsets` (in chars) as text
    /// is inserted and removed around them.
    ///
    /// Each patch is located fuzzily near where earlier patches put it.
    /// Patches that cannot be located, or whose surroundings differ too
    /// much, are dropped and reported as not applied. The buffer is
    /// read-only for users during the merge and editable again afterwards,
    /// also when a buffer operation fails.
    pub fn apply(
        buffer: &mut dyn LiveBuffer,
        patches: &[Patch],
        offsets: &mut [usize],
    ) -> EndpointResult<MergeReport> {
        let mut report = MergeReport::default();
        if patches.is_empty() {
            return Ok(report);
        }

        let lock = EditLock::new(buffer);
        let mut patches = patches.to_vec();
        let padding = patch_add_padding(&mut patches);
        let pad = padding.chars().count();
        let current = lock.buffer.text()?;
        let mut text: Vec<char> = padding
            .chars()
            .chain(current.chars())
            .chain(padding.chars())
            .collect();
        patch_split_max(&mut patches);

        // Offset between where a patch was expected and where it was found.
        let mut drift: isize = 0;
        for patch in &patches {
            let expected = (patch.start2 as isize + drift).max(0) as usize;
            let growth = patch.length2 as isize - patch.length1 as isize;
            let source: Vec<char> = patch.source_text().chars().collect();

            let Some(location) = locate(&text, &source, expected) else {
                debug!(expected, "patch context not found");
                drift -= growth;
                report.results.push(false);
                continue;
            };
            drift = location.start as isize - expected as isize;

            let source_str: String = source.iter().collect();
            let window: String = location.window(&text, source.len()).iter().collect();
            let diffs = diff_main(&source_str, &window, false);
            if source.len() > MATCH_MAX_BITS
                && levenshtein(&diffs) as f64 / source.len() as f64 > PATCH_DELETE_THRESHOLD
            {
                // End points match but the content between them does not.
                // Treat it like a patch that was never found.
                debug!(start = location.start, "patch content too different");
                drift -= growth;
                report.results.push(false);
                continue;
            }

            let mut index1 = 0;
            for diff in &patch.diffs {
                let len = diff.char_len();
                // Edits never touch the padding.
                let real_len = text.len() - 2 * pad;
                let to_real = |i: usize| i.saturating_sub(pad).min(real_len);
                match diff.op {
                    Op::Insert => {
                        let at = to_real(location.start + x_index(&diffs, index1));
                        lock.buffer.insert(at, &diff.text)?;
                        text.splice(at + pad..at + pad, diff.text.chars());
                        for offset in offsets.iter_mut() {
                            if *offset >= at {
                                *offset += len;
                            }
                        }
                    }
                    Op::Delete => {
                        let start = to_real(location.start + x_index(&diffs, index1));
                        let end = to_real(location.start + x_index(&diffs, index1 + len));
                        if end > start {
                            lock.buffer.remove(start, end - start)?;
                            text.drain(start + pad..end + pad);
                            for offset in offsets.iter_mut() {
                                if *offset > start {
                                    if *offset < end {
                                        *offset = start;
                                    } else {
                                        *offset -= end - start;
                                    }
                                }
                            }
                        }
                    }
                    Op::Equal => {}
                }
                if diff.op != Op::Delete {
                    index1 += len;
                }
            }
            trace!(start = location.start, drift, "patch merged");
            report.results.push(true);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointError, MemoryEndpoint};
    use difsync_diff::{cleanup_efficiency, cleanup_semantic, patch_make};

    fn patches(source: &str, target: &str) -> Vec<Patch> {
        let mut diffs = diff_main(source, target, true);
        if diffs.len() > 2 {
            cleanup_semantic(&mut diffs);
            cleanup_efficiency(&mut diffs);
        }
        patch_make(source, &diffs)
    }

    #[test]
    fn source_buffer_becomes_target() {
        let cases = [
            ("", "fresh text"),
            ("hello world", "hello big world"),
            (
                "The quick brown fox jumps over the lazy dog.",
                "That quick brown fox jumped over a lazy dog.",
            ),
            ("línea uno\nlínea dos\n", "línea uno\nlínea 2\nlínea tres\n"),
            ("remove everything", ""),
        ];
        for (source, target) in cases {
            let mut buffer = MemoryEndpoint::new(source);
            let report = PatchMerger::apply(&mut buffer, &patches(source, target), &mut []).unwrap();
            assert!(report.is_clean(), "{source:?} -> {target:?}");
            assert_eq!(buffer.text(), target);
        }
    }

    #[test]
    fn insertion_shifts_offsets_at_or_after_it() {
        let mut buffer = MemoryEndpoint::new("hello world");
        let mut offsets = [3, 6, 8];
        PatchMerger::apply(
            &mut buffer,
            &patches("hello world", "hello big world"),
            &mut offsets,
        )
        .unwrap();
        assert_eq!(buffer.text(), "hello big world");
        assert_eq!(offsets, [3, 10, 12]);
    }

    #[test]
    fn deletion_collapses_offsets_inside_it() {
        let mut buffer = MemoryEndpoint::new("hello cruel world");
        let mut offsets = [6, 9, 14, 2];
        PatchMerger::apply(
            &mut buffer,
            &patches("hello cruel world", "hello world"),
            &mut offsets,
        )
        .unwrap();
        assert_eq!(buffer.text(), "hello world");
        assert_eq!(offsets, [6, 6, 8, 2]);
    }

    #[test]
    fn merges_into_concurrently_edited_text() {
        let source = "The quick brown fox jumps over the lazy dog.";
        let target = "The quick brown fox leaps over the lazy dog.";
        let mut buffer = MemoryEndpoint::new("Well, the quick brown fox jumps over the lazy dog!");
        let mut caret = [50];
        let report = PatchMerger::apply(&mut buffer, &patches(source, target), &mut caret).unwrap();
        assert!(report.is_clean());
        assert_eq!(buffer.text(), "Well, the quick brown fox leaps over the lazy dog!");
        assert_eq!(caret, [50]);
    }

    #[test]
    fn unlocatable_patch_is_dropped_and_later_ones_still_apply() {
        let filler = "0123456789".repeat(6);
        let source = format!("The quick brown fox jumps. {filler} Pack my box with five dozen jugs.");
        let target = format!("The slow brown fox jumps. {filler} Pack my box with six dozen jugs.");
        let live = format!("#### ##### ####. {filler} Pack my box with five dozen jugs.");
        let mut buffer = MemoryEndpoint::new(&live);
        let report = PatchMerger::apply(&mut buffer, &patches(&source, &target), &mut []).unwrap();
        assert_eq!(report.results, vec![false, true]);
        assert_eq!(
            buffer.text(),
            format!("#### ##### ####. {filler} Pack my box with six dozen jugs.")
        );
    }

    #[test]
    fn located_but_mismatched_deletion_is_rejected() {
        let chunk = "abcdefghij".repeat(8);
        let tail = " and then some more words here";
        let source = format!("HEAD{chunk}TAIL{tail}");
        let target = format!("HEADTAIL{}", tail.replace("words", "WORDS"));
        let live = format!(
            "HEAD{}{}{}TAIL{tail}",
            &chunk[..28],
            "#".repeat(90),
            &chunk[52..]
        );
        let mut buffer = MemoryEndpoint::new(&live);
        let report = PatchMerger::apply(&mut buffer, &patches(&source, &target), &mut []).unwrap();
        assert_eq!(report.results, vec![false, true]);
        assert_eq!(buffer.text(), live.replace("words", "WORDS"));
    }

    struct BrokenBuffer {
        editable: bool,
        was_locked: bool,
    }

    impl LiveBuffer for BrokenBuffer {
        fn text(&self) -> EndpointResult<String> {
            Ok("hello world".into())
        }

        fn insert(&mut self, _at: usize, _text: &str) -> EndpointResult<()> {
            Err(EndpointError::failed("widget gone"))
        }

        fn remove(&mut self, _at: usize, _len: usize) -> EndpointResult<()> {
            Err(EndpointError::failed("widget gone"))
        }

        fn set_editable(&mut self, editable: bool) {
            if !editable {
                self.was_locked = true;
            }
            self.editable = editable;
        }
    }

    #[test]
    fn buffer_is_unlocked_after_failure() {
        let mut buffer = BrokenBuffer {
            editable: true,
            was_locked: false,
        };
        let result = PatchMerger::apply(
            &mut buffer,
            &patches("hello world", "hello big world"),
            &mut [],
        );
        assert!(result.is_err());
        assert!(buffer.was_locked);
        assert!(buffer.editable);
    }

    #[test]
    fn empty_patch_list_is_a_no_op() {
        let mut buffer = MemoryEndpoint::new("abc");
        let report = PatchMerger::apply(&mut buffer, &[], &mut [1]).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(buffer.text(), "abc");
    }
}
