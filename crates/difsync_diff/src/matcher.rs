//! Fuzzy location of a pattern near an expected offset (bitap).

use std::collections::HashMap;

/// At what point is no match declared (0.0 = perfection, 1.0 = very loose).
pub const MATCH_THRESHOLD: f64 = 0.5;

/// How far to search for a match (0 = exact location, 1000+ = broad match).
///
/// A match this many chars away from the expected location adds 1.0 to
/// the score.
pub const MATCH_DISTANCE: usize = 1000;

/// Longest pattern the bitap matcher accepts, in chars.
pub const MATCH_MAX_BITS: usize = 32;

/// Locates the best instance of `pattern` in `text` near `loc`.
///
/// Returns the char offset of the match, or `None` if nothing scores
/// under [`MATCH_THRESHOLD`].
pub fn match_main(text: &str, pattern: &str, loc: usize) -> Option<usize> {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    match_chars(&text, &pattern, loc)
}

/// Same as [`match_main`] over pre-split char slices.
pub fn match_chars(text: &[char], pattern: &[char], loc: usize) -> Option<usize> {
    let loc = loc.min(text.len());
    if text == pattern {
        return Some(0);
    }
    if text.is_empty() {
        return None;
    }
    if loc + pattern.len() <= text.len() && text[loc..loc + pattern.len()] == *pattern {
        return Some(loc);
    }
    if pattern.len() > MATCH_MAX_BITS {
        return nearest_exact(text, pattern, loc);
    }
    match_bitap(text, pattern, loc)
}

/// Patterns too long for bitap only match exactly.
fn nearest_exact(text: &[char], pattern: &[char], loc: usize) -> Option<usize> {
    let after = find_from(text, pattern, loc);
    let before = rfind_until(text, pattern, loc);
    match (before, after) {
        (Some(b), Some(a)) => Some(if loc - b <= a - loc { b } else { a }),
        (b, a) => b.or(a),
    }
}

fn match_bitap(text: &[char], pattern: &[char], loc: usize) -> Option<usize> {
    let alphabet = match_alphabet(pattern);
    let score = |errors: usize, x: usize| -> f64 {
        let accuracy = errors as f64 / pattern.len() as f64;
        accuracy + loc.abs_diff(x) as f64 / MATCH_DISTANCE as f64
    };

    // Exact matches nearby tighten the threshold.
    let mut threshold = MATCH_THRESHOLD;
    if let Some(hit) = find_from(text, pattern, loc) {
        threshold = threshold.min(score(0, hit));
        if let Some(hit) = rfind_until(text, pattern, loc + pattern.len()) {
            threshold = threshold.min(score(0, hit));
        }
    }

    let match_mask: u64 = 1 << (pattern.len() - 1);
    let mut best_loc = None;
    let mut bin_max = pattern.len() + text.len();
    let mut last_rd: Vec<u64> = Vec::new();

    for d in 0..pattern.len() {
        // Binary search for how far from loc this error level may stray.
        let mut bin_min = 0;
        let mut bin_mid = bin_max;
        while bin_min < bin_mid {
            if score(d, loc + bin_mid) <= threshold {
                bin_min = bin_mid;
            } else {
                bin_max = bin_mid;
            }
            bin_mid = (bin_max - bin_min) / 2 + bin_min;
        }
        bin_max = bin_mid;

        let mut start = (loc as isize - bin_mid as isize + 1).max(1) as usize;
        let finish = (loc + bin_mid).min(text.len()) + pattern.len();

        let mut rd = vec![0u64; finish + 2];
        rd[finish + 1] = (1u64 << d) - 1;
        let mut j = finish;
        while j >= start {
            let char_match = text
                .get(j - 1)
                .and_then(|c| alphabet.get(c))
                .copied()
                .unwrap_or(0);
            rd[j] = if d == 0 {
                ((rd[j + 1] << 1) | 1) & char_match
            } else {
                let prev = |i: usize| last_rd.get(i).copied().unwrap_or(0);
                (((rd[j + 1] << 1) | 1) & char_match)
                    | (((prev(j + 1) | prev(j)) << 1) | 1)
                    | prev(j + 1)
            };
            if rd[j] & match_mask != 0 {
                let value = score(d, j - 1);
                if value <= threshold {
                    threshold = value;
                    best_loc = Some(j - 1);
                    if j - 1 > loc {
                        // When passing loc, don't exceed our current distance.
                        start = (2 * loc as isize - (j - 1) as isize).max(1) as usize;
                    } else {
                        break;
                    }
                }
            }
            j -= 1;
        }
        if score(d + 1, loc) > threshold {
            // No hope for a better match at greater error levels.
            break;
        }
        last_rd = rd;
    }
    best_loc
}

fn match_alphabet(pattern: &[char]) -> HashMap<char, u64> {
    let mut alphabet = HashMap::new();
    for (i, c) in pattern.iter().enumerate() {
        *alphabet.entry(*c).or_insert(0) |= 1u64 << (pattern.len() - i - 1);
    }
    alphabet
}

/// First exact occurrence of `pattern` at or after `from`.
pub(crate) fn find_from(text: &[char], pattern: &[char], from: usize) -> Option<usize> {
    if pattern.len() > text.len() || from > text.len() - pattern.len() {
        return None;
    }
    (from..=text.len() - pattern.len()).find(|&i| text[i..i + pattern.len()] == *pattern)
}

/// Last exact occurrence of `pattern` starting at or before `until`.
pub(crate) fn rfind_until(text: &[char], pattern: &[char], until: usize) -> Option<usize> {
    if pattern.len() > text.len() {
        return None;
    }
    let last = until.min(text.len() - pattern.len());
    (0..=last).rev().find(|&i| text[i..i + pattern.len()] == *pattern)
}
