//! Sync session: registry, cycle loop and wire exchange.
//!
//! A [`SyncSession`] batches every registered document into one request per
//! cycle, sends it over its transport and routes the response back to the
//! documents. A background worker repeats this with an adaptive pause until
//! the registry is empty or the session is shut down.
//!
//! ## Cycle
//!
//! 1. Every document contributes an `F:` header and its pending edits (or
//!    an `N:` line when all documents are being nullified).
//! 2. With no documents nothing happens. With no edit lines the exchange is
//!    skipped and an empty response is processed instead.
//! 3. Otherwise one blocking exchange is made. Failures count as an empty
//!    response; pending edits are resent next cycle.
//! 4. The response is parsed as a whole. A truncated response is dropped
//!    before any line is applied.
//! 5. The pause before the next cycle is adjusted to the observed activity.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use difsync_diff::{from_delta, text2};
use difsync_protocol::{
    format_request, parse_response, ClientLine, DocumentId, ParsedResponse, ResponseCommand,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::document::{DeltaOutcome, SharedDocument};
use crate::error::{SyncError, SyncResult};
use crate::interval::IntervalController;
use crate::session_id::{RandomSessionIds, SessionIdGenerator};
use crate::transport::SyncTransport;

/// Summary of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Documents taking part in the cycle.
    pub documents: usize,
    /// Whether a network exchange was made.
    pub network_used: bool,
    /// Whether the response was dropped as truncated.
    pub discarded: bool,
    /// Whether any document had local edits.
    pub client_changed: bool,
    /// Whether any document received remote edits.
    pub server_changed: bool,
    /// Response lines that could not be parsed.
    pub skipped: usize,
    /// Pause before the next cycle.
    pub next_interval: Duration,
}

#[derive(Default)]
struct Registry {
    docs: BTreeMap<String, SharedDocument>,
    worker_running: bool,
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    config: SessionConfig,
    session_id: String,
    ids: Mutex<Box<dyn SessionIdGenerator>>,
    transport: Box<dyn SyncTransport>,
    registry: Mutex<Registry>,
    interval: Mutex<IntervalController>,
    nullify_all: AtomicBool,
    cycle: Mutex<()>,
}

/// A client session syncing a set of documents with one gateway.
pub struct SyncSession {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("session_id", &self.inner.session_id)
            .field("gateway", &self.inner.config.gateway)
            .field("documents", &self.documents())
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    /// Creates a session with a random session id.
    pub fn new(config: SessionConfig, transport: impl SyncTransport + 'static) -> SyncResult<Self> {
        Self::with_id_generator(config, transport, RandomSessionIds::new())
    }

    /// Creates a session drawing its ids from `ids`.
    ///
    /// The first id names the session; later ids name one-shot downloads
    /// and uploads so they never disturb the session's own server views.
    pub fn with_id_generator(
        config: SessionConfig,
        transport: impl SyncTransport + 'static,
        mut ids: impl SessionIdGenerator + 'static,
    ) -> SyncResult<Self> {
        config.validate()?;
        let session_id = ids.next_id();
        let interval = IntervalController::new(
            config.min_sync_interval,
            config.max_sync_interval,
            config.initial_sync_interval,
        );
        info!(session_id = %session_id, gateway = %config.gateway, "sync session created");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                session_id,
                ids: Mutex::new(Box::new(ids)),
                transport: Box::new(transport),
                registry: Mutex::new(Registry::default()),
                interval: Mutex::new(interval),
                nullify_all: AtomicBool::new(false),
                cycle: Mutex::new(()),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Session id sent with every request.
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Ids of the registered documents.
    pub fn documents(&self) -> Vec<String> {
        self.inner.registry.lock().docs.keys().cloned().collect()
    }

    /// Whether a document with this id is registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.inner.registry.lock().docs.contains_key(id)
    }

    /// Pause before the next cycle.
    pub fn current_interval(&self) -> Duration {
        self.inner.interval.lock().current()
    }

    /// Whether the background worker is running.
    pub fn is_running(&self) -> bool {
        self.inner.registry.lock().worker_running
    }

    /// Starts syncing `documents`.
    ///
    /// Registering a document twice is a no-op. A document owned by another
    /// session is refused and nothing is registered. Starts the background
    /// worker if enabled and idle.
    pub fn register(&self, documents: &[SharedDocument]) -> SyncResult<()> {
        let session_id = &self.inner.session_id;
        let start = {
            let mut registry = self.inner.registry.lock();

            // Check and claim under one document lock, registry held.
            let mut claimed: Vec<&SharedDocument> = Vec::new();
            for doc in documents {
                let mut state = doc.lock();
                match state.owner() {
                    Some(owner) if owner != session_id.as_str() => {
                        let owner = owner.to_string();
                        drop(state);
                        for doc in claimed {
                            doc.lock().set_owner(None);
                        }
                        return Err(SyncError::AlreadyShared {
                            id: doc.id().to_string(),
                            owner,
                        });
                    }
                    Some(_) => {}
                    None => {
                        state.set_owner(Some(session_id.clone()));
                        claimed.push(doc);
                    }
                }
            }

            for doc in documents {
                let key = doc.id().to_string();
                if registry.docs.get(&key).is_some_and(|d| d.ptr_eq(doc)) {
                    continue;
                }
                if let Some(replaced) = registry.docs.insert(key, doc.clone()) {
                    replaced.lock().set_owner(None);
                }
                info!(id = %doc.id(), "sharing document");
            }
            let start = self.inner.config.background
                && !registry.docs.is_empty()
                && !registry.worker_running;
            if start {
                registry.worker_running = true;
            }
            start
        };

        if start {
            self.spawn_worker()?;
        }
        Ok(())
    }

    /// Stops syncing `documents`. Unknown documents are ignored.
    pub fn unregister(&self, documents: &[SharedDocument]) {
        let mut registry = self.inner.registry.lock();
        for doc in documents {
            let key = doc.id().as_str();
            if registry.docs.get(key).is_some_and(|d| d.ptr_eq(doc)) {
                registry.docs.remove(key);
                doc.lock().set_owner(None);
                info!(id = %doc.id(), "unshared document");
            } else {
                debug!(id = %doc.id(), "ignoring unshare, not registered");
            }
        }
    }

    /// Stops syncing the documents with these ids.
    pub fn unregister_ids(&self, ids: &[&str]) {
        let mut registry = self.inner.registry.lock();
        for id in ids {
            match registry.docs.remove(*id) {
                Some(doc) => {
                    doc.lock().set_owner(None);
                    info!(id = %id, "unshared document");
                }
                None => debug!(id = %id, "ignoring unshare, not registered"),
            }
        }
    }

    /// Asks the server to forget every registered document on the next
    /// cycle. The documents are unregistered as part of that cycle.
    pub fn nullify_all(&self) {
        self.inner.nullify_all.store(true, Ordering::SeqCst);
    }

    /// Runs one cycle on the calling thread.
    ///
    /// Never fails: transport and endpoint errors are logged and degrade
    /// as described in the module documentation. Cycles never overlap.
    pub fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle()
    }

    /// Fetches the current server text of `ids` without registering them.
    pub fn download(&self, ids: &[&str]) -> SyncResult<BTreeMap<String, String>> {
        let prefix = &self.inner.config.id_prefix;
        let mut lines = vec![ClientLine::User {
            session_id: self.inner.ids.lock().next_id(),
            echo: false,
        }];
        for id in ids {
            let id = DocumentId::parse(*id)?;
            lines.push(ClientLine::File {
                server_version: 0,
                id: id.with_prefix(prefix),
            });
            // An empty dump makes the server answer with its full text.
            lines.push(ClientLine::Raw {
                force: false,
                client_version: 0,
                text: String::new(),
            });
        }

        let response = self.inner.transport.exchange(&format_request(&lines))?;
        let parsed = parse_response(&response)?;
        let mut texts = BTreeMap::new();
        let mut current: Option<String> = None;
        for command in parsed.commands {
            match command {
                ResponseCommand::File { id, .. } => {
                    current = id.strip_prefix(prefix.as_str()).map(str::to_string);
                }
                ResponseCommand::Delta { delta, .. } => {
                    if let Some(id) = &current {
                        texts.insert(id.clone(), text2(&from_delta("", &delta)?));
                    }
                }
                ResponseCommand::Raw { text, .. } => {
                    if let Some(id) = &current {
                        texts.insert(id.clone(), text);
                    }
                }
                ResponseCommand::User { .. } => {}
            }
        }
        for id in ids {
            if !texts.contains_key(*id) {
                return Err(SyncError::MissingDocument(id.to_string()));
            }
        }
        Ok(texts)
    }

    /// Overwrites the server text of each document in `texts`.
    pub fn upload(&self, texts: &BTreeMap<String, String>) -> SyncResult<()> {
        let prefix = &self.inner.config.id_prefix;
        let mut lines = vec![ClientLine::User {
            session_id: self.inner.ids.lock().next_id(),
            echo: false,
        }];
        for (id, text) in texts {
            let id = DocumentId::parse(id.as_str())?;
            lines.push(ClientLine::File {
                server_version: 0,
                id: id.with_prefix(prefix),
            });
            lines.push(ClientLine::Raw {
                force: true,
                client_version: 0,
                text: text.clone(),
            });
        }

        let response = self.inner.transport.exchange(&format_request(&lines))?;
        if response.trim().is_empty() {
            return Err(SyncError::transport_retryable("gateway returned no answer"));
        }
        Ok(())
    }

    /// Stops the background worker, interrupting its pause. Documents stay
    /// registered; registering again restarts the worker.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            // The worker may already have exited on its own.
            let _ = worker.stop.send(());
            if worker.handle.join().is_err() {
                error!(session_id = %self.inner.session_id, "sync worker panicked");
            }
        }
        self.inner.registry.lock().worker_running = false;
    }

    fn spawn_worker(&self) -> SyncResult<()> {
        let mut slot = self.worker.lock();
        if let Some(old) = slot.take() {
            // Flagged as stopped, so it is exiting or gone.
            let _ = old.handle.join();
        }
        let (stop, signal) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("difsync-{}", self.inner.session_id))
            .spawn(move || inner.run_loop(signal));
        match spawned {
            Ok(handle) => {
                *slot = Some(Worker { stop, handle });
                Ok(())
            }
            Err(e) => {
                self.inner.registry.lock().worker_running = false;
                Err(SyncError::Worker(e))
            }
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clears the running flag if the worker unwinds, so the next `register`
/// starts a new one. Disarmed on a normal exit.
struct RunningGuard<'a>(Option<&'a Inner>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Some(inner) = self.0 {
            inner.registry.lock().worker_running = false;
            error!(session_id = %inner.session_id, "sync worker panicked");
        }
    }
}

impl Inner {
    fn run_loop(&self, stop: Receiver<()>) {
        info!(session_id = %self.session_id, "sync worker started");
        let mut running = RunningGuard(Some(self));
        loop {
            {
                // Checked and cleared under one lock so a concurrent
                // `register` either sees the worker running or starts one.
                let mut registry = self.registry.lock();
                if registry.docs.is_empty() {
                    registry.worker_running = false;
                    break;
                }
            }
            let report = self.run_cycle();
            match stop.recv_timeout(report.next_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    self.registry.lock().worker_running = false;
                    break;
                }
            }
        }
        running.0 = None;
        info!(session_id = %self.session_id, "sync worker stopped");
    }

    fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock();
        let docs: Vec<SharedDocument> = self.registry.lock().docs.values().cloned().collect();
        let mut report = CycleReport {
            documents: docs.len(),
            ..CycleReport::default()
        };
        if docs.is_empty() {
            report.next_interval = self.interval.lock().current();
            return report;
        }

        let prefix = self.config.id_prefix.as_str();
        let nullify = self.nullify_all.swap(false, Ordering::SeqCst);
        let mut body = ClientLine::User {
            session_id: self.session_id.clone(),
            echo: false,
        }
        .to_string();
        let mut edits = 0;
        for doc in &docs {
            let mut state = doc.lock();
            if nullify {
                body.push_str(&state.nullify(prefix));
                edits += 1;
            } else {
                let out = state.produce_outgoing(prefix);
                report.client_changed |= out.changed;
                edits += out.edits;
                body.push_str(&out.fragment);
            }
        }
        if nullify {
            let mut registry = self.registry.lock();
            for doc in &docs {
                let key = doc.id().as_str();
                if registry.docs.get(key).is_some_and(|d| d.ptr_eq(doc)) {
                    registry.docs.remove(key);
                }
            }
        }

        let parsed = if edits == 0 {
            debug!("all documents silent, skipping exchange");
            Ok(ParsedResponse::default())
        } else {
            body.push('\n');
            debug!(request = %body, "to server");
            report.network_used = true;
            match self.transport.exchange(&body) {
                Ok(response) => {
                    debug!(response = %response, "from server");
                    parse_response(&response)
                }
                Err(e) => {
                    warn!(error = %e, "exchange failed, treating as empty response");
                    Ok(ParsedResponse::default())
                }
            }
        };

        match parsed {
            Ok(parsed) => {
                for skipped in &parsed.skipped {
                    warn!(line = %skipped.line, reason = %skipped.reason, "skipping response line");
                }
                report.skipped = parsed.skipped.len();
                self.dispatch(&parsed, &mut report);
            }
            Err(e) => {
                warn!(error = %e, "discarding response");
                report.discarded = true;
            }
        }

        report.next_interval = self
            .interval
            .lock()
            .adjust(report.client_changed, report.server_changed);
        report
    }

    fn dispatch(&self, parsed: &ParsedResponse, report: &mut CycleReport) {
        let prefix = self.config.id_prefix.as_str();
        let mut current: Option<SharedDocument> = None;
        let mut acked = 0;
        for command in &parsed.commands {
            match command {
                ResponseCommand::User { session_id } => {
                    debug!(session_id = %session_id, "server echoed session id");
                }
                ResponseCommand::File { client_version, id } => {
                    current = None;
                    let Some(local) = id.strip_prefix(prefix) else {
                        warn!(id = %id, prefix, "document id lacks prefix");
                        continue;
                    };
                    let doc = self.registry.lock().docs.get(local).cloned();
                    match doc {
                        Some(doc) => {
                            doc.lock().on_ack(*client_version);
                            acked = *client_version;
                            current = Some(doc);
                        }
                        None => warn!(id = %local, "unknown document"),
                    }
                }
                ResponseCommand::Raw {
                    force,
                    server_version,
                    text,
                } => {
                    if let Some(doc) = &current {
                        doc.lock()
                            .on_raw_override(text, *server_version, *force, acked);
                        report.server_changed = true;
                    }
                }
                ResponseCommand::Delta {
                    overwrite,
                    server_version,
                    delta,
                } => {
                    if let Some(doc) = &current {
                        let outcome =
                            doc.lock()
                                .on_delta(delta, acked, *server_version, *overwrite);
                        match outcome {
                            DeltaOutcome::Applied { changed: true } => report.server_changed = true,
                            DeltaOutcome::Desync => self.interval.lock().request_resync(),
                            _ => {}
                        }
                    }
                }
            }
        }
    }
}
