//! Per-document synchronization state.
//!
//! A [`DocumentSyncState`] tracks one shared document: the shadow copy of
//! what the server last saw, the version counters on both sides and the
//! log of edits the server has not acknowledged yet. The session asks it
//! for an outgoing fragment every cycle and feeds it the server's answer.

use std::sync::{Arc, LazyLock};

use difsync_diff::{
    cleanup_efficiency, cleanup_semantic, diff_main, from_delta, is_noop, patch_apply, patch_make,
    text2, to_delta, Op, Patch,
};
use difsync_protocol::{ClientLine, DocumentId};
use parking_lot::{Mutex, MutexGuard};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::endpoint::{EndpointResult, ShareEndpoint};
use crate::error::SyncResult;
use crate::merger::PatchMerger;

static NUMERIC: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\s*-?[\d.,]+\s*$"));

fn looks_numeric(text: &str) -> bool {
    match &*NUMERIC {
        Ok(pattern) => pattern.is_match(text),
        Err(_) => false,
    }
}

/// How concurrent edits to a document are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Merge concurrent edits (free text).
    #[default]
    Merge,
    /// Last write wins (numbers, enumerated values).
    Overwrite,
    /// Overwrite while the text looks like a number, merge otherwise.
    Auto,
}

impl SyncMode {
    /// Whether `text` should be merged under this mode.
    pub fn merges(self, text: &str) -> bool {
        match self {
            SyncMode::Merge => true,
            SyncMode::Overwrite => false,
            SyncMode::Auto => !looks_numeric(text),
        }
    }
}

/// An outgoing edit waiting for the server's acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    /// Client version the edit is keyed by.
    pub version: u64,
    /// Wire line without its terminator, e.g. `d:3:=5\t+x`.
    pub action: String,
}

/// Fragment produced for one document in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outgoing {
    /// Wire lines, newline-terminated. Empty when the document sits the
    /// cycle out.
    pub fragment: String,
    /// Number of edit lines in the fragment.
    pub edits: usize,
    /// Whether a local edit was found against the shadow. Full dumps
    /// never count as a local edit.
    pub changed: bool,
}

/// Outcome of a server delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// The delta was decoded and applied.
    Applied {
        /// False when the delta changed nothing.
        changed: bool,
    },
    /// Already seen; ignored.
    Stale,
    /// Version mismatch; a full resync follows.
    Rejected,
    /// The delta does not fit the shadow; a full resync follows soon.
    Desync,
}

/// Durable state of a document, for hosts that persist across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Document id.
    pub id: DocumentId,
    /// Shadow text.
    pub shadow: String,
    /// Client version.
    pub client_version: u64,
    /// Server version.
    pub server_version: u64,
    /// Whether the last server delta applied cleanly.
    pub delta_ok: bool,
    /// Sync mode.
    pub mode: SyncMode,
    /// Unacknowledged edits, oldest first.
    pub edit_stack: Vec<PendingEdit>,
}

/// Protocol state of one shared document.
pub struct DocumentSyncState {
    id: DocumentId,
    shadow: String,
    client_version: u64,
    server_version: u64,
    delta_ok: bool,
    mode: SyncMode,
    edit_stack: Vec<PendingEdit>,
    owner: Option<String>,
    endpoint: Box<dyn ShareEndpoint>,
}

impl std::fmt::Debug for DocumentSyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSyncState")
            .field("id", &self.id)
            .field("client_version", &self.client_version)
            .field("server_version", &self.server_version)
            .field("delta_ok", &self.delta_ok)
            .field("mode", &self.mode)
            .field("pending", &self.edit_stack.len())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl DocumentSyncState {
    /// Creates the state for a new document bound to `endpoint`.
    ///
    /// Fails if `id` does not match the identifier grammar. The first
    /// cycle sends a full dump of the endpoint text.
    pub fn new(id: &str, endpoint: impl ShareEndpoint + 'static) -> SyncResult<Self> {
        Ok(Self {
            id: DocumentId::parse(id)?,
            shadow: String::new(),
            client_version: 0,
            server_version: 0,
            delta_ok: false,
            mode: SyncMode::default(),
            edit_stack: Vec::new(),
            owner: None,
            endpoint: Box::new(endpoint),
        })
    }

    /// Rebuilds the state from a snapshot.
    pub fn restore(snapshot: DocumentSnapshot, endpoint: impl ShareEndpoint + 'static) -> Self {
        Self {
            id: snapshot.id,
            shadow: snapshot.shadow,
            client_version: snapshot.client_version,
            server_version: snapshot.server_version,
            delta_ok: snapshot.delta_ok,
            mode: snapshot.mode,
            edit_stack: snapshot.edit_stack,
            owner: None,
            endpoint: Box::new(endpoint),
        }
    }

    /// Sets the sync mode.
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Captures the durable state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: self.id.clone(),
            shadow: self.shadow.clone(),
            client_version: self.client_version,
            server_version: self.server_version,
            delta_ok: self.delta_ok,
            mode: self.mode,
            edit_stack: self.edit_stack.clone(),
        }
    }

    /// Document id.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Shadow text.
    pub fn shadow_text(&self) -> &str {
        &self.shadow
    }

    /// Client version.
    pub fn client_version(&self) -> u64 {
        self.client_version
    }

    /// Server version.
    pub fn server_version(&self) -> u64 {
        self.server_version
    }

    /// Whether the last server delta applied cleanly.
    pub fn delta_ok(&self) -> bool {
        self.delta_ok
    }

    /// Sync mode.
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Unacknowledged edits, oldest first.
    pub fn edit_stack(&self) -> &[PendingEdit] {
        &self.edit_stack
    }

    /// Session id of the owning session, if registered.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
    }

    /// Mutable access to the bound endpoint.
    pub fn endpoint_mut(&mut self) -> &mut dyn ShareEndpoint {
        self.endpoint.as_mut()
    }

    fn push_edit(&mut self, version: u64, line: ClientLine) {
        let mut action = line.to_string();
        action.pop();
        self.edit_stack.push(PendingEdit { version, action });
    }

    /// Builds this document's part of the next request.
    ///
    /// The fragment is an `F:` header followed by every pending edit. When
    /// the endpoint cannot be read the document contributes nothing.
    pub fn produce_outgoing(&mut self, prefix: &str) -> Outgoing {
        let text = match self.endpoint.read_text() {
            Ok(text) => text,
            Err(e) => {
                error!(id = %self.id, error = %e, "failed to read endpoint");
                return Outgoing::default();
            }
        };
        let Some(next_version) = self.client_version.checked_add(1) else {
            error!(id = %self.id, version = self.client_version, "client version exhausted");
            return Outgoing::default();
        };
        let merge = self.mode.merges(&text);

        let mut changed = false;
        if self.delta_ok {
            let mut diffs = diff_main(&self.shadow, &text, true);
            if diffs.len() > 2 {
                cleanup_semantic(&mut diffs);
                cleanup_efficiency(&mut diffs);
            }
            // Anything but a single equality counts, including an empty diff.
            changed = !matches!(diffs.as_slice(), [only] if only.op == Op::Equal);
            if changed {
                self.shadow = text;
            }
            // A no-change delta is only worth sending when nothing else is.
            if changed || self.edit_stack.is_empty() {
                let line = ClientLine::Delta {
                    overwrite: !merge,
                    client_version: self.client_version,
                    delta: to_delta(&diffs),
                };
                self.push_edit(self.client_version, line);
                self.client_version = next_version;
            }
        } else {
            // Full dump; edits since the last good round are lost.
            self.client_version = next_version;
            let line = ClientLine::Raw {
                force: false,
                client_version: self.client_version,
                text: text.clone(),
            };
            self.shadow = text;
            self.push_edit(self.client_version, line);
        }

        let mut fragment = ClientLine::File {
            server_version: self.server_version,
            id: self.id.with_prefix(prefix),
        }
        .to_string();
        for edit in &self.edit_stack {
            fragment.push_str(&edit.action);
            fragment.push('\n');
        }
        Outgoing {
            fragment,
            edits: self.edit_stack.len(),
            changed,
        }
    }

    /// Builds the line asking the server to forget this document and
    /// detaches it from its session.
    pub fn nullify(&mut self, prefix: &str) -> String {
        info!(id = %self.id, "nullifying document");
        self.owner = None;
        ClientLine::Nullify {
            id: self.id.with_prefix(prefix),
        }
        .to_string()
    }

    /// Handles an `F:` acknowledgement of client edits up to `acked`.
    ///
    /// Idempotent: acknowledging the same version again changes nothing.
    pub fn on_ack(&mut self, acked: u64) {
        let before = self.edit_stack.len();
        self.edit_stack.retain(|edit| edit.version > acked);
        self.delta_ok = true;
        if before != self.edit_stack.len() {
            debug!(id = %self.id, acked, purged = before - self.edit_stack.len(), "edits acknowledged");
        }
    }

    /// Handles a raw text dump from the server.
    ///
    /// The shadow and both counters are reset to the server's lineage and
    /// pending edits are dropped. With `force` the endpoint is overwritten
    /// too; otherwise the next delta carries the local text on top.
    ///
    /// Counters at `u64::MAX` leave no room for another edit; such a dump
    /// is refused and the next cycle sends a full dump instead.
    pub fn on_raw_override(&mut self, text: &str, server_version: u64, force: bool, acked: u64) {
        if server_version == u64::MAX || acked == u64::MAX {
            warn!(id = %self.id, server_version, acked, "raw override with exhausted version");
            self.delta_ok = false;
            return;
        }
        if server_version < self.server_version || acked < self.client_version {
            warn!(
                id = %self.id,
                server_version,
                acked,
                "raw override resets version counters"
            );
        }
        self.shadow = text.to_string();
        self.server_version = server_version;
        self.client_version = acked;
        self.edit_stack.clear();
        if force {
            if let Err(e) = self.endpoint.write_text(text) {
                error!(id = %self.id, error = %e, "failed to write endpoint");
            }
        }
    }

    /// Handles a delta from the server.
    ///
    /// `acked` is the client version from the preceding `F:` line.
    pub fn on_delta(
        &mut self,
        delta: &str,
        acked: u64,
        server_version: u64,
        overwrite: bool,
    ) -> DeltaOutcome {
        if acked != self.client_version {
            warn!(id = %self.id, expected = self.client_version, got = acked, "client version mismatch");
            self.delta_ok = false;
            return DeltaOutcome::Rejected;
        }
        let Some(next_version) = self.server_version.checked_add(1) else {
            warn!(id = %self.id, version = self.server_version, "server version exhausted");
            self.delta_ok = false;
            return DeltaOutcome::Rejected;
        };
        if server_version > next_version {
            warn!(id = %self.id, expected = self.server_version, got = server_version, "server version in future");
            self.delta_ok = false;
            return DeltaOutcome::Rejected;
        }
        if server_version < self.server_version {
            warn!(id = %self.id, expected = self.server_version, got = server_version, "server version in past");
            return DeltaOutcome::Stale;
        }

        let diffs = match from_delta(&self.shadow, delta) {
            Ok(diffs) => diffs,
            Err(e) => {
                warn!(id = %self.id, error = %e, "delta does not fit shadow");
                self.delta_ok = false;
                return DeltaOutcome::Desync;
            }
        };
        self.server_version = next_version;
        if is_noop(&diffs) {
            return DeltaOutcome::Applied { changed: false };
        }

        if overwrite {
            self.shadow = text2(&diffs);
            if let Err(e) = self.endpoint.write_text(&self.shadow) {
                error!(id = %self.id, error = %e, "failed to write endpoint");
            }
        } else {
            let patches = patch_make(&self.shadow, &diffs);
            let (shadow, _) = patch_apply(&patches, &self.shadow);
            self.shadow = shadow;
            if let Err(e) = self.merge_into_endpoint(&patches) {
                error!(id = %self.id, error = %e, "failed to merge into endpoint");
            }
        }
        DeltaOutcome::Applied { changed: true }
    }

    fn merge_into_endpoint(&mut self, patches: &[Patch]) -> EndpointResult<()> {
        let mut offsets = self.endpoint.cursor_offsets();
        let merged = match self.endpoint.live_buffer() {
            Some(buffer) => Some(PatchMerger::apply(buffer, patches, &mut offsets)?),
            None => None,
        };
        match merged {
            Some(report) => {
                if !report.is_clean() {
                    debug!(id = %self.id, rejected = report.rejected(), "patches dropped during merge");
                }
                self.endpoint.set_cursor_offsets(&offsets);
            }
            None => {
                let text = self.endpoint.read_text()?;
                let (patched, _) = patch_apply(patches, &text);
                if patched != text {
                    self.endpoint.write_text(&patched)?;
                }
            }
        }
        Ok(())
    }
}

/// A document handle shared between a session and its host.
#[derive(Debug, Clone)]
pub struct SharedDocument {
    id: DocumentId,
    state: Arc<Mutex<DocumentSyncState>>,
}

impl SharedDocument {
    /// Wraps a document state.
    pub fn new(state: DocumentSyncState) -> Self {
        Self {
            id: state.id.clone(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Document id.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Locks the state.
    pub fn lock(&self) -> MutexGuard<'_, DocumentSyncState> {
        self.state.lock()
    }

    /// True if both handles refer to the same document state.
    pub fn ptr_eq(&self, other: &SharedDocument) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
