//! JSON state file kept between `share`/`sync` runs.
//!
//! Holds the session id and every document's snapshot, so a later run
//! resumes the same server views instead of starting with full dumps.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use difsync_engine::DocumentSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// One shared file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// File the document is bound to.
    pub path: PathBuf,
    /// Sync state of the document.
    pub snapshot: DocumentSnapshot,
}

/// Contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateFile {
    /// Session id the snapshots belong to.
    pub session_id: Option<String>,
    /// Gateway the snapshots were made against.
    pub gateway: Option<String>,
    /// Shared documents.
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

impl SyncStateFile {
    /// Loads the state file; a missing file yields an empty state.
    pub fn load(path: &Path) -> CliResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(CliError::io(path, e)),
        };
        serde_json::from_str(&raw).map_err(|source| CliError::State {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the state file, replacing it atomically.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| CliError::State {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| CliError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| CliError::io(path, e))
    }

    /// Snapshot stored for document `id`.
    pub fn snapshot(&self, id: &str) -> Option<&DocumentSnapshot> {
        self.documents
            .iter()
            .find(|entry| entry.snapshot.id.as_str() == id)
            .map(|entry| &entry.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use difsync_engine::{DocumentSyncState, MemoryEndpoint};
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempdir().unwrap();
        let state = SyncStateFile::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, SyncStateFile::default());
    }

    #[test]
    fn saves_and_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let doc = DocumentSyncState::new("notes.txt", MemoryEndpoint::new("x")).unwrap();
        let state = SyncStateFile {
            session_id: Some("abcdefgh".into()),
            gateway: Some("telnet://localhost:3017".into()),
            documents: vec![DocumentEntry {
                path: dir.path().join("notes.txt"),
                snapshot: doc.snapshot(),
            }],
        };
        state.save(&path).unwrap();

        let loaded = SyncStateFile::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.snapshot("notes.txt").is_some());
        assert!(loaded.snapshot("other").is_none());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = SyncStateFile::load(&path).unwrap_err();
        assert!(matches!(err, CliError::State { .. }));
    }
}
