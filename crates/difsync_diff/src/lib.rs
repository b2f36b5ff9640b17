//! # difsync diff
//!
//! Text diff, delta and fuzzy patch primitives used by the difsync engine.
//!
//! This crate provides:
//! - Character diffs with an optional line-level pre-pass
//! - Merge, semantic and efficiency cleanups
//! - Compact delta encoding (`=n`, `-n`, `+text`, tab separated)
//! - `encodeURI`-compatible escaping
//! - Bitap fuzzy matching
//! - Patch construction, padding, splitting and fuzzy application
//!
//! ## Units
//!
//! Every offset and length in this crate counts Unicode scalar values
//! (`char`s), never bytes.
//!
//! ## Usage
//!
//! ```
//! use difsync_diff::{diff_main, from_delta, to_delta};
//!
//! let diffs = diff_main("The cat sat.", "The hat sat.", false);
//! let delta = to_delta(&diffs);
//! assert_eq!(delta, "=4\t-1\t+h\t=7");
//! assert_eq!(from_delta("The cat sat.", &delta).unwrap(), diffs);
//! ```
//!
//! This is a pure computation crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cleanup;
mod delta;
mod diff;
mod error;
mod matcher;
mod patch;
mod uri;

pub use cleanup::{cleanup_efficiency, cleanup_merge, cleanup_semantic, EDIT_COST};
pub use delta::{from_delta, to_delta};
pub use diff::{
    diff_main, is_noop, levenshtein, text1, text2, x_index, Diff, Op, DIFF_TIMEOUT,
};
pub use error::{DiffError, DiffResult};
pub use matcher::{
    match_chars, match_main, MATCH_DISTANCE, MATCH_MAX_BITS, MATCH_THRESHOLD,
};
pub use patch::{
    locate, patch_add_padding, patch_apply, patch_make, patch_split_max, patches_from_text,
    patches_to_text, Location, Patch, PATCH_DELETE_THRESHOLD, PATCH_MARGIN,
};
pub use uri::{decode_uri, encode_uri};
