//! CLI command implementations.

pub mod download;
pub mod share;
pub mod upload;

use std::path::Path;

use difsync_protocol::DocumentId;

use crate::error::{CliError, CliResult};

/// Document id of a shared file: its file name, unless overridden.
pub fn document_id_for(path: &Path, id: Option<&str>) -> CliResult<DocumentId> {
    if let Some(id) = id {
        return Ok(DocumentId::parse(id)?);
    }
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::Usage(format!("{} has no usable file name", path.display())))?;
    DocumentId::parse(name).map_err(|_| {
        CliError::Usage(format!(
            "cannot use file name {name:?} as a document id; pass --id"
        ))
    })
}
