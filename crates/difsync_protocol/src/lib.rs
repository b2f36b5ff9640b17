//! # difsync protocol
//!
//! Wire format of the differential synchronization protocol.
//!
//! This crate provides:
//! - `DocumentId` with the identifier grammar
//! - `ClientLine` request lines and the request parser
//! - `ResponseCommand` response lines and the response parser
//! - Session id alphabet helpers
//!
//! Requests and responses are newline-delimited `<code>:<value>` lines
//! terminated by a blank line. A request starts with `u:<session>` and
//! carries, per document, either `N:<id>` or `F:<serverVersion>:<id>`
//! followed by `d:`/`D:` deltas or an `r:` raw dump. A response carries,
//! per document, `F:<clientVersion>:<id>` followed by `d:`/`D:` deltas or
//! `r:`/`R:` raw dumps.
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
mod lines;
mod request;
mod response;
mod session_id;

pub use error::{ProtocolError, ProtocolResult, SkipReason, SkippedLine};
pub use id::{is_valid_id, DocumentId};
pub use request::{format_request, parse_request, ClientLine, ParsedRequest};
pub use response::{format_response, parse_response, ParsedResponse, ResponseCommand};
pub use session_id::{is_valid_session_id, SESSION_ID_HEAD, SESSION_ID_LEN, SESSION_ID_TAIL};
