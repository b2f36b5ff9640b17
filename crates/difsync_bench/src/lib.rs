//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WORDS: &[&str] = &[
    "sync", "shadow", "delta", "patch", "server", "client", "édition", "versión", "text", "merge",
];

/// Generates `lines` lines of pseudo-random prose.
pub fn random_text(seed: u64, lines: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text = String::new();
    for _ in 0..lines {
        let words = rng.gen_range(3..12);
        for i in 0..words {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
        }
        text.push('\n');
    }
    text
}

/// Applies `edits` random insertions and deletions to `text`, the way a
/// user typing between two sync cycles would.
pub fn mutate(text: &str, seed: u64, edits: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut chars: Vec<char> = text.chars().collect();
    for _ in 0..edits {
        let at = rng.gen_range(0..=chars.len());
        if rng.gen_bool(0.5) || chars.is_empty() {
            let word = WORDS[rng.gen_range(0..WORDS.len())];
            chars.splice(at..at, word.chars());
        } else {
            let end = (at + rng.gen_range(1..8)).min(chars.len());
            chars.drain(at..end);
        }
    }
    chars.into_iter().collect()
}
