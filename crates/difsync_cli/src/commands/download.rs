//! Download command implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use difsync_engine::{SessionConfig, SyncSession};
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::gateway;

/// Fetches the server text of `ids` without sharing them.
pub fn fetch(config: SessionConfig, ids: &[String]) -> CliResult<BTreeMap<String, String>> {
    if ids.is_empty() {
        return Err(CliError::Usage("no document ids given".into()));
    }
    let config = config.with_background(false);
    let transport = gateway::connect(&config)?;
    let session = SyncSession::new(config, transport)?;
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    Ok(session.download(&ids)?)
}

/// Runs the download command: writes one file per document into `out`,
/// or prints the texts when no directory is given.
pub fn run(config: SessionConfig, ids: &[String], out: Option<&Path>) -> CliResult<()> {
    let texts = fetch(config, ids)?;
    match out {
        Some(dir) => {
            for (id, text) in &texts {
                let path = dir.join(id);
                fs::write(&path, text).map_err(|e| CliError::io(&path, e))?;
                info!(id = %id, path = %path.display(), "downloaded");
            }
        }
        None if texts.len() == 1 => {
            for text in texts.values() {
                print!("{text}");
            }
        }
        None => {
            for (id, text) in &texts {
                println!("==> {id} <==");
                println!("{text}");
            }
        }
    }
    Ok(())
}
