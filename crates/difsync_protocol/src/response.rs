//! Server-to-client response lines.

use std::fmt;

use difsync_diff::{decode_uri, encode_uri};

use crate::error::{ProtocolResult, SkipReason, SkippedLine};
use crate::lines::{framed_lines, split_line};

/// One command of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCommand {
    /// `u:<session>` echoed back by the server on request.
    User {
        /// The echoed session id.
        session_id: String,
    },
    /// `F:<clientVersion>:<id>` selects the document for the following
    /// commands and acknowledges the client's edits up to `client_version`.
    File {
        /// Highest client version the server has applied.
        client_version: u64,
        /// Wire id, including any namespace prefix.
        id: String,
    },
    /// `r:` or `R:` carrying the server's full text.
    Raw {
        /// True for `R:`: overwrite the endpoint, not just the shadow.
        force: bool,
        /// Server version of the text.
        server_version: u64,
        /// Unescaped full text.
        text: String,
    },
    /// `d:` or `D:` carrying a delta against the client's shadow.
    Delta {
        /// True for `D:`: replace the endpoint text instead of merging.
        overwrite: bool,
        /// Server version the delta was computed at.
        server_version: u64,
        /// Encoded delta.
        delta: String,
    },
}

impl fmt::Display for ResponseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCommand::User { session_id } => writeln!(f, "u:{session_id}"),
            ResponseCommand::File { client_version, id } => {
                writeln!(f, "F:{client_version}:{id}")
            }
            ResponseCommand::Raw {
                force,
                server_version,
                text,
            } => writeln!(
                f,
                "{}:{server_version}:{}",
                if *force { 'R' } else { 'r' },
                encode_uri(text)
            ),
            ResponseCommand::Delta {
                overwrite,
                server_version,
                delta,
            } => writeln!(
                f,
                "{}:{server_version}:{delta}",
                if *overwrite { 'D' } else { 'd' }
            ),
        }
    }
}

/// Result of parsing a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Commands in the order received.
    pub commands: Vec<ResponseCommand>,
    /// Lines that could not be understood.
    pub skipped: Vec<SkippedLine>,
}

impl ParsedResponse {
    /// Returns true if the response carried no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Parses a response body.
///
/// The body must end with a blank line (`\n\n` or `\r\n\r\n`); otherwise it
/// is rejected before any line is looked at. Parsing stops at the first
/// blank line. Lines that cannot be parsed are collected in
/// [`ParsedResponse::skipped`] and do not affect the other lines.
pub fn parse_response(body: &str) -> ProtocolResult<ParsedResponse> {
    let mut parsed = ParsedResponse::default();
    for line in framed_lines(body)? {
        match parse_command(line) {
            Ok(command) => parsed.commands.push(command),
            Err(reason) => parsed.skipped.push(SkippedLine {
                line: line.to_string(),
                reason,
            }),
        }
    }
    Ok(parsed)
}

fn parse_command(line: &str) -> Result<ResponseCommand, SkipReason> {
    let raw = split_line(line)?;
    let version = raw.version.unwrap_or_default();
    match raw.code {
        'u' | 'U' => Ok(ResponseCommand::User {
            session_id: raw.value.to_string(),
        }),
        'f' | 'F' => Ok(ResponseCommand::File {
            client_version: version,
            id: raw.value.to_string(),
        }),
        'r' | 'R' => Ok(ResponseCommand::Raw {
            force: raw.code == 'R',
            server_version: version,
            text: decode_uri(raw.value).map_err(|_| SkipReason::InvalidEscape)?,
        }),
        'd' | 'D' => Ok(ResponseCommand::Delta {
            overwrite: raw.code == 'D',
            server_version: version,
            delta: raw.value.to_string(),
        }),
        other => Err(SkipReason::UnknownCode(other)),
    }
}

/// Renders a complete response body, including the terminating blank line.
pub fn format_response<'a>(commands: impl IntoIterator<Item = &'a ResponseCommand>) -> String {
    let mut body: String = commands.into_iter().map(ToString::to_string).collect();
    body.push('\n');
    body
}
