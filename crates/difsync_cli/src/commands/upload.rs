//! Upload command implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use difsync_engine::{SessionConfig, SyncSession};
use tracing::info;

use crate::commands::document_id_for;
use crate::error::{CliError, CliResult};
use crate::gateway;

/// Runs the upload command: overwrites the server text of every file's
/// document with the file contents.
pub fn run(config: SessionConfig, files: &[PathBuf], id: Option<&str>) -> CliResult<()> {
    if files.is_empty() {
        return Err(CliError::Usage("no files to upload".into()));
    }
    if id.is_some() && files.len() > 1 {
        return Err(CliError::Usage("--id needs exactly one file".into()));
    }

    let mut texts = BTreeMap::new();
    for path in files {
        let id = document_id_for(path, id)?;
        let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        texts.insert(id.as_str().to_string(), text);
    }

    let config = config.with_background(false);
    let transport = gateway::connect(&config)?;
    let session = SyncSession::new(config, transport)?;
    session.upload(&texts)?;
    info!(documents = texts.len(), "uploaded");
    Ok(())
}
