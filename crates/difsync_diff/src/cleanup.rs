//! Post-processing passes over a diff.

use crate::diff::{common_prefix, common_suffix, Diff, Op};

/// Cost of an empty edit operation in chars, used by [`cleanup_efficiency`].
pub const EDIT_COST: usize = 4;

/// Reorders and merges like edit sections, factoring out commonalities.
///
/// Any edit section can move as long as it doesn't cross an equality.
pub fn cleanup_merge(diffs: &mut Vec<Diff>) {
    diffs.push(Diff::equal(""));
    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete = String::new();
    let mut text_insert = String::new();

    while pointer < diffs.len() {
        match diffs[pointer].op {
            Op::Insert => {
                count_insert += 1;
                text_insert.push_str(&diffs[pointer].text);
                pointer += 1;
            }
            Op::Delete => {
                count_delete += 1;
                text_delete.push_str(&diffs[pointer].text);
                pointer += 1;
            }
            Op::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let prefix = common_prefix(&text_insert, &text_delete);
                        if prefix != 0 {
                            let start = pointer - count_delete - count_insert;
                            let common = text_insert[..prefix].to_string();
                            if start > 0 && diffs[start - 1].op == Op::Equal {
                                diffs[start - 1].text.push_str(&common);
                            } else {
                                diffs.insert(0, Diff::equal(common));
                                pointer += 1;
                            }
                            text_insert.drain(..prefix);
                            text_delete.drain(..prefix);
                        }
                        let suffix = common_suffix(&text_insert, &text_delete);
                        if suffix != 0 {
                            let common = text_insert.split_off(text_insert.len() - suffix);
                            text_delete.truncate(text_delete.len() - suffix);
                            diffs[pointer].text.insert_str(0, &common);
                        }
                    }
                    let start = pointer - count_delete - count_insert;
                    diffs.drain(start..pointer);
                    pointer = start;
                    if !text_delete.is_empty() {
                        diffs.insert(pointer, Diff::delete(std::mem::take(&mut text_delete)));
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        diffs.insert(pointer, Diff::insert(std::mem::take(&mut text_insert)));
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && diffs[pointer - 1].op == Op::Equal {
                    let text = diffs.remove(pointer).text;
                    diffs[pointer - 1].text.push_str(&text);
                } else {
                    pointer += 1;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }
    coalesce(diffs);

    // Second pass: look for single edits surrounded on both sides by
    // equalities which can be shifted sideways to eliminate an equality.
    // e.g: A<ins>BA</ins>C -> <ins>AB</ins>AC
    let mut changes = false;
    let mut pointer = 1;
    while pointer + 1 < diffs.len() {
        if diffs[pointer - 1].op == Op::Equal && diffs[pointer + 1].op == Op::Equal {
            let prev = diffs[pointer - 1].text.clone();
            let next = diffs[pointer + 1].text.clone();
            if !prev.is_empty() && diffs[pointer].text.ends_with(prev.as_str()) {
                let keep = diffs[pointer].text.len() - prev.len();
                let head = diffs[pointer].text[..keep].to_string();
                diffs[pointer].text = format!("{prev}{head}");
                diffs[pointer + 1].text = format!("{prev}{next}");
                diffs.remove(pointer - 1);
                changes = true;
            } else if !next.is_empty() && diffs[pointer].text.starts_with(next.as_str()) {
                diffs[pointer - 1].text.push_str(&next);
                let tail = diffs[pointer].text[next.len()..].to_string();
                diffs[pointer].text = format!("{tail}{next}");
                diffs.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }
    if changes {
        cleanup_merge(diffs);
    }
}

/// Drops empty operations and joins neighbours of the same kind.
fn coalesce(diffs: &mut Vec<Diff>) {
    let mut merged: Vec<Diff> = Vec::with_capacity(diffs.len());
    for diff in diffs.drain(..) {
        if diff.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.op == diff.op => last.text.push_str(&diff.text),
            _ => merged.push(diff),
        }
    }
    *diffs = merged;
}

/// Eliminates semantically trivial equalities.
///
/// An equality no longer than the edits on both of its sides is folded
/// into those edits, which turns scattered char-level noise into one
/// readable replacement.
pub fn cleanup_semantic(diffs: &mut Vec<Diff>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<String> = None;
    let mut pointer: isize = 0;
    // Edit sizes before and after the last equality.
    let mut insertions_before = 0;
    let mut deletions_before = 0;
    let mut insertions_after = 0;
    let mut deletions_after = 0;

    while (pointer as usize) < diffs.len() {
        let p = pointer as usize;
        if diffs[p].op == Op::Equal {
            equalities.push(p);
            insertions_before = insertions_after;
            deletions_before = deletions_after;
            insertions_after = 0;
            deletions_after = 0;
            last_equality = Some(diffs[p].text.clone()).filter(|t| !t.is_empty());
        } else {
            let len = diffs[p].char_len();
            if diffs[p].op == Op::Insert {
                insertions_after += len;
            } else {
                deletions_after += len;
            }
            if let Some(equality) = last_equality.clone() {
                let eq_len = equality.chars().count();
                if eq_len <= insertions_before.max(deletions_before)
                    && eq_len <= insertions_after.max(deletions_after)
                {
                    if let Some(&index) = equalities.last() {
                        diffs.insert(index, Diff::delete(equality));
                        diffs[index + 1].op = Op::Insert;
                        // Throw away the equality we just deleted, and the
                        // previous one since it needs re-evaluation.
                        equalities.pop();
                        equalities.pop();
                        pointer = equalities.last().map_or(-1, |&i| i as isize);
                        insertions_before = 0;
                        deletions_before = 0;
                        insertions_after = 0;
                        deletions_after = 0;
                        last_equality = None;
                        changes = true;
                    }
                }
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(diffs);
    }
}

/// Eliminates operationally trivial equalities.
///
/// Short equalities sandwiched between edits cost more to transmit as
/// separate operations than as part of a larger replacement.
pub fn cleanup_efficiency(diffs: &mut Vec<Diff>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<String> = None;
    let mut pointer: isize = 0;
    let mut pre_ins = false;
    let mut pre_del = false;
    let mut post_ins = false;
    let mut post_del = false;

    while (pointer as usize) < diffs.len() {
        let p = pointer as usize;
        if diffs[p].op == Op::Equal {
            if diffs[p].char_len() < EDIT_COST && (post_ins || post_del) {
                equalities.push(p);
                pre_ins = post_ins;
                pre_del = post_del;
                last_equality = Some(diffs[p].text.clone());
            } else {
                equalities.clear();
                last_equality = None;
            }
            post_ins = false;
            post_del = false;
        } else {
            if diffs[p].op == Op::Delete {
                post_del = true;
            } else {
                post_ins = true;
            }

            // Five types to be split:
            // <ins>A</ins><del>B</del>XY<ins>C</ins><del>D</del>
            // <ins>A</ins>X<ins>C</ins><del>D</del>
            // <ins>A</ins><del>B</del>X<ins>C</ins>
            // <ins>A</del>X<ins>C</ins><del>D</del>
            // <ins>A</ins><del>B</del>X<del>C</del>
            if let Some(equality) = last_equality.clone() {
                let flags = [pre_ins, pre_del, post_ins, post_del]
                    .iter()
                    .filter(|f| **f)
                    .count();
                let surrounded = pre_ins && pre_del && post_ins && post_del;
                if surrounded || (equality.chars().count() < EDIT_COST / 2 && flags == 3) {
                    if let Some(&index) = equalities.last() {
                        diffs.insert(index, Diff::delete(equality));
                        diffs[index + 1].op = Op::Insert;
                        equalities.pop();
                        last_equality = None;
                        if pre_ins && pre_del {
                            // No changes made which could affect previous entry.
                            post_ins = true;
                            post_del = true;
                            equalities.clear();
                        } else {
                            equalities.pop();
                            pointer = equalities.last().map_or(-1, |&i| i as isize);
                            post_ins = false;
                            post_del = false;
                        }
                        changes = true;
                    }
                }
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(diffs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_joins_like_operations() {
        let mut diffs = vec![Diff::equal("a"), Diff::equal("b"), Diff::equal("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::equal("abc")]);

        let mut diffs = vec![Diff::delete("a"), Diff::delete("b"), Diff::delete("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::delete("abc")]);

        let mut diffs = vec![
            Diff::delete("a"),
            Diff::insert("b"),
            Diff::delete("c"),
            Diff::insert("d"),
            Diff::equal("e"),
            Diff::equal("f"),
        ];
        cleanup_merge(&mut diffs);
        assert_eq!(
            diffs,
            vec![Diff::delete("ac"), Diff::insert("bd"), Diff::equal("ef")]
        );
    }

    #[test]
    fn merge_factors_common_prefix_and_suffix() {
        let mut diffs = vec![Diff::delete("a"), Diff::insert("abc"), Diff::delete("dc")];
        cleanup_merge(&mut diffs);
        assert_eq!(
            diffs,
            vec![
                Diff::equal("a"),
                Diff::delete("d"),
                Diff::insert("b"),
                Diff::equal("c"),
            ]
        );
    }

    #[test]
    fn merge_slides_edits() {
        let mut diffs = vec![Diff::equal("a"), Diff::insert("ba"), Diff::equal("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::insert("ab"), Diff::equal("ac")]);

        let mut diffs = vec![Diff::equal("a"), Diff::insert("ab"), Diff::equal("a")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::equal("aa"), Diff::insert("ba")]);
    }

    #[test]
    fn semantic_folds_small_equalities() {
        let mut diffs = vec![
            Diff::delete("a"),
            Diff::equal("b"),
            Diff::delete("c"),
        ];
        cleanup_semantic(&mut diffs);
        assert_eq!(diffs, vec![Diff::delete("abc"), Diff::insert("b")]);

        let mut diffs = vec![
            Diff::delete("ab"),
            Diff::insert("cd"),
            Diff::equal("12"),
            Diff::delete("e"),
        ];
        cleanup_semantic(&mut diffs);
        assert_eq!(
            diffs,
            vec![
                Diff::delete("ab"),
                Diff::insert("cd"),
                Diff::equal("12"),
                Diff::delete("e"),
            ]
        );
    }

    #[test]
    fn efficiency_folds_cheap_equalities() {
        let mut diffs = vec![
            Diff::delete("ab"),
            Diff::insert("12"),
            Diff::equal("xyz"),
            Diff::delete("cd"),
            Diff::insert("34"),
        ];
        cleanup_efficiency(&mut diffs);
        assert_eq!(diffs, vec![Diff::delete("abxyzcd"), Diff::insert("12xyz34")]);

        let mut diffs = vec![
            Diff::delete("ab"),
            Diff::insert("12"),
            Diff::equal("wxyz"),
            Diff::delete("cd"),
            Diff::insert("34"),
        ];
        cleanup_efficiency(&mut diffs);
        assert_eq!(diffs.len(), 5);
    }
}
