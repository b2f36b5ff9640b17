//! # difsync engine
//!
//! Client half of the differential synchronization protocol.
//!
//! This crate provides:
//! - Per-document sync state (shadow text, versions, pending edits)
//! - Cursor-preserving patch merging into live buffers
//! - Sync sessions batching documents into one exchange per cycle
//! - Adaptive polling interval
//! - Endpoint and transport abstractions (HTTP, raw TCP, mock)
//!
//! ## Architecture
//!
//! Every cycle the session asks each [`DocumentSyncState`] for its
//! outgoing edits, sends them to the gateway in a single request and
//! hands the response back to the documents. Each side keeps a shadow of
//! what the other last saw, so only deltas travel and concurrent edits are
//! merged instead of overwritten.
//!
//! ## Key Invariants
//!
//! - Version counters only move forward, except when a raw dump from the
//!   server resets a document to the server's lineage
//! - Pending edits are resent until acknowledged
//! - A failed exchange or endpoint never aborts a cycle
//! - A truncated response is discarded whole
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use difsync_engine::{
//!     DocumentSyncState, MemoryEndpoint, MockTransport, SessionConfig, SharedDocument,
//!     SyncSession,
//! };
//!
//! let transport = Arc::new(MockTransport::new());
//! let config = SessionConfig::new("http://localhost/scripts/q.py").with_background(false);
//! let session = SyncSession::new(config, Arc::clone(&transport)).unwrap();
//!
//! let field = MemoryEndpoint::new("Hello");
//! let doc = SharedDocument::new(DocumentSyncState::new("greeting", field.clone()).unwrap());
//! session.register(&[doc]).unwrap();
//!
//! transport.push_response("F:1:greeting\nd:0:=5\t+ world\n\n");
//! session.run_cycle();
//! assert_eq!(field.text(), "Hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod document;
mod endpoint;
mod error;
mod http;
mod interval;
mod merger;
mod session;
mod session_id;
mod tcp;
mod transport;

pub use config::SessionConfig;
pub use document::{
    DeltaOutcome, DocumentSnapshot, DocumentSyncState, Outgoing, PendingEdit, SharedDocument,
    SyncMode,
};
pub use endpoint::{EndpointError, EndpointResult, LiveBuffer, MemoryEndpoint, ShareEndpoint};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, QUERY_FIELD};
pub use interval::IntervalController;
pub use merger::{MergeReport, PatchMerger};
pub use session::{CycleReport, SyncSession};
pub use session_id::{FixedSessionId, RandomSessionIds, SessionIdGenerator};
pub use tcp::{TcpTransport, TELNET_SCHEME};
pub use transport::{MockTransport, SyncTransport};
