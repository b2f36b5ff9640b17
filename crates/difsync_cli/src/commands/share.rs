//! Share/sync command implementation.

use std::path::{Path, PathBuf};
use std::thread;

use difsync_engine::{
    DocumentSyncState, FixedSessionId, RandomSessionIds, SessionConfig, SessionIdGenerator,
    SharedDocument, SyncMode, SyncSession,
};
use tracing::{info, warn};

use crate::commands::document_id_for;
use crate::endpoint::FileEndpoint;
use crate::error::{CliError, CliResult};
use crate::gateway;
use crate::state::{DocumentEntry, SyncStateFile};

/// Options of a share run.
#[derive(Debug, Clone)]
pub struct ShareOptions {
    /// Files to share.
    pub files: Vec<PathBuf>,
    /// Document id overriding the file name (single file only).
    pub id: Option<String>,
    /// State file.
    pub state: PathBuf,
    /// Sync mode forced on every file. Without it new documents merge and
    /// resumed documents keep their saved mode.
    pub mode: Option<SyncMode>,
    /// Number of cycles to run; `None` runs until killed.
    pub cycles: Option<u64>,
}

/// Runs the share command.
pub fn run(config: SessionConfig, options: &ShareOptions) -> CliResult<()> {
    if options.files.is_empty() {
        return Err(CliError::Usage("no files to share".into()));
    }
    if options.id.is_some() && options.files.len() > 1 {
        return Err(CliError::Usage("--id needs exactly one file".into()));
    }

    let mut state = SyncStateFile::load(&options.state)?;
    if state.gateway.as_deref().is_some_and(|g| g != config.gateway) {
        warn!(
            previous = ?state.gateway,
            gateway = %config.gateway,
            "gateway changed, starting over"
        );
        state = SyncStateFile::default();
    }

    let config = config.with_background(false);
    let transport = gateway::connect(&config)?;
    let session_id = state
        .session_id
        .clone()
        .unwrap_or_else(|| RandomSessionIds::new().next_id());
    let session =
        SyncSession::with_id_generator(config, transport, FixedSessionId(session_id.clone()))?;

    let mut docs = Vec::with_capacity(options.files.len());
    for path in &options.files {
        let id = document_id_for(path, options.id.as_deref())?;
        let endpoint = FileEndpoint::new(path);
        let mut doc = match state.snapshot(id.as_str()) {
            Some(snapshot) => {
                info!(id = %id, mode = ?snapshot.mode, "resuming document");
                DocumentSyncState::restore(snapshot.clone(), endpoint)
            }
            None => DocumentSyncState::new(id.as_str(), endpoint)?,
        };
        if let Some(mode) = options.mode {
            doc = doc.with_mode(mode);
        }
        docs.push((path.clone(), SharedDocument::new(doc)));
    }
    let shared: Vec<SharedDocument> = docs.iter().map(|(_, doc)| doc.clone()).collect();
    session.register(&shared)?;

    let mut cycle = 0;
    loop {
        let report = session.run_cycle();
        cycle += 1;
        info!(
            cycle,
            sent = report.network_used,
            client_changed = report.client_changed,
            server_changed = report.server_changed,
            "sync cycle done"
        );
        save(&options.state, &session_id, session.config(), &docs)?;
        if options.cycles.is_some_and(|limit| cycle >= limit) {
            break;
        }
        thread::sleep(report.next_interval);
    }
    session.unregister(&shared);
    Ok(())
}

fn save(
    path: &Path,
    session_id: &str,
    config: &SessionConfig,
    docs: &[(PathBuf, SharedDocument)],
) -> CliResult<()> {
    let state = SyncStateFile {
        session_id: Some(session_id.to_string()),
        gateway: Some(config.gateway.clone()),
        documents: docs
            .iter()
            .map(|(path, doc)| DocumentEntry {
                path: path.clone(),
                snapshot: doc.lock().snapshot(),
            })
            .collect(),
    };
    state.save(path)
}
