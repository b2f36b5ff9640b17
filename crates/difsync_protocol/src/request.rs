//! Client-to-server request lines.

use std::fmt;

use difsync_diff::{decode_uri, encode_uri};

use crate::error::{ProtocolResult, SkipReason, SkippedLine};
use crate::lines::{framed_lines, split_line};

/// One line of a client request.
///
/// `Display` renders the newline-terminated wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// `u:<session>` (or `U:` to ask the server to echo the session id).
    User {
        /// Session id of the client.
        session_id: String,
        /// Whether the server should echo the session id back.
        echo: bool,
    },
    /// `F:<serverVersion>:<id>` selects the document for the following edits.
    File {
        /// Last server version the client has seen.
        server_version: u64,
        /// Wire id, including any namespace prefix.
        id: String,
    },
    /// `N:<id>` asks the server to forget the document.
    Nullify {
        /// Wire id, including any namespace prefix.
        id: String,
    },
    /// `d:` (merge) or `D:` (overwrite) carrying an encoded delta.
    Delta {
        /// True for `D:`.
        overwrite: bool,
        /// Client version the delta was computed at.
        client_version: u64,
        /// Delta against the server's shadow.
        delta: String,
    },
    /// `r:` or `R:` carrying the full text.
    Raw {
        /// True for `R:`, which asks the server to overwrite its copy.
        force: bool,
        /// Client version after this dump.
        client_version: u64,
        /// Unescaped full text.
        text: String,
    },
}

impl fmt::Display for ClientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientLine::User { session_id, echo } => {
                writeln!(f, "{}:{session_id}", if *echo { 'U' } else { 'u' })
            }
            ClientLine::File { server_version, id } => writeln!(f, "F:{server_version}:{id}"),
            ClientLine::Nullify { id } => writeln!(f, "N:{id}"),
            ClientLine::Delta {
                overwrite,
                client_version,
                delta,
            } => writeln!(
                f,
                "{}:{client_version}:{delta}",
                if *overwrite { 'D' } else { 'd' }
            ),
            ClientLine::Raw {
                force,
                client_version,
                text,
            } => writeln!(
                f,
                "{}:{client_version}:{}",
                if *force { 'R' } else { 'r' },
                encode_uri(text)
            ),
        }
    }
}

/// Result of parsing a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Lines in the order received.
    pub lines: Vec<ClientLine>,
    /// Lines that could not be understood.
    pub skipped: Vec<SkippedLine>,
}

/// Parses a request body as sent by a client.
///
/// A body that does not end with a blank line is rejected as truncated.
pub fn parse_request(body: &str) -> ProtocolResult<ParsedRequest> {
    let mut parsed = ParsedRequest::default();
    for line in framed_lines(body)? {
        match parse_client_line(line) {
            Ok(client_line) => parsed.lines.push(client_line),
            Err(reason) => parsed.skipped.push(SkippedLine {
                line: line.to_string(),
                reason,
            }),
        }
    }
    Ok(parsed)
}

fn parse_client_line(line: &str) -> Result<ClientLine, SkipReason> {
    let raw = split_line(line)?;
    let version = raw.version.unwrap_or_default();
    let value = raw.value.to_string();
    match raw.code {
        'u' | 'U' => Ok(ClientLine::User {
            session_id: value,
            echo: raw.code == 'U',
        }),
        'f' | 'F' => Ok(ClientLine::File {
            server_version: version,
            id: value,
        }),
        'n' | 'N' => Ok(ClientLine::Nullify { id: value }),
        'd' | 'D' => Ok(ClientLine::Delta {
            overwrite: raw.code == 'D',
            client_version: version,
            delta: value,
        }),
        'r' | 'R' => Ok(ClientLine::Raw {
            force: raw.code == 'R',
            client_version: version,
            text: decode_uri(raw.value).map_err(|_| SkipReason::InvalidEscape)?,
        }),
        other => Err(SkipReason::UnknownCode(other)),
    }
}

/// Renders a complete request body, including the terminating blank line.
pub fn format_request<'a>(lines: impl IntoIterator<Item = &'a ClientLine>) -> String {
    let mut body: String = lines.into_iter().map(ToString::to_string).collect();
    body.push('\n');
    body
}
