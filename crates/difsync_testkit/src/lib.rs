//! # difsync Testkit
//!
//! Test utilities for difsync.
//!
//! This crate provides:
//! - An in-memory reference server speaking the sync protocol
//! - A socket daemon wrapper around it for `telnet://` gateways
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use difsync_testkit::prelude::*;
//!
//! let server = ReferenceServer::new();
//! let response = server.handle("u:abcdefgh\nF:0:doc\nr:1:hello\n\n");
//! assert_eq!(response, "F:1:doc\nd:0:=5\n\n");
//! assert_eq!(server.text("doc").as_deref(), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod daemon;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::daemon::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use daemon::*;
pub use generators::*;
pub use server::*;
