//! Line framing shared by requests and responses.

use crate::error::{ProtocolError, ProtocolResult, SkipReason};

/// Commands whose value starts with `<version>:`.
const VERSIONED: &str = "FfDdRr";

/// Checks the terminating blank line and returns the lines before it.
pub(crate) fn framed_lines(body: &str) -> ProtocolResult<Vec<&str>> {
    if !(body.ends_with("\n\n") || body.ends_with("\r\n\r\n")) {
        return Err(ProtocolError::Truncated { len: body.len() });
    }
    Ok(body
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .take_while(|line| !line.is_empty())
        .collect())
}

/// A `<code>:<value>` line with its version split off when the code has one.
#[derive(Debug)]
pub(crate) struct RawLine<'a> {
    pub code: char,
    pub version: Option<u64>,
    pub value: &'a str,
}

pub(crate) fn split_line(line: &str) -> Result<RawLine<'_>, SkipReason> {
    let mut chars = line.chars();
    let code = chars.next().ok_or(SkipReason::NoSeparator)?;
    let value = chars
        .as_str()
        .strip_prefix(':')
        .ok_or(SkipReason::NoSeparator)?;
    if !VERSIONED.contains(code) {
        return Ok(RawLine {
            code,
            version: None,
            value,
        });
    }
    let (version, value) = value.split_once(':').ok_or(SkipReason::MissingVersion)?;
    if version.is_empty() {
        return Err(SkipReason::MissingVersion);
    }
    let version = version.parse().map_err(|_| SkipReason::InvalidVersion)?;
    Ok(RawLine {
        code,
        version: Some(version),
        value,
    })
}
