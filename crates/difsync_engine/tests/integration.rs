//! End-to-end tests of sessions talking to the reference server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use difsync_engine::{
    DocumentSyncState, FixedSessionId, MemoryEndpoint, RandomSessionIds, SessionConfig,
    SharedDocument, SyncError, SyncResult, SyncSession, SyncTransport, TcpTransport,
};
use difsync_testkit::prelude::*;
use proptest::prelude::*;

/// Hands requests straight to a [`ReferenceServer`].
struct Loopback {
    server: Arc<ReferenceServer>,
    lose_response: AtomicBool,
    truncate_response: AtomicBool,
}

impl Loopback {
    fn new(server: Arc<ReferenceServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            lose_response: AtomicBool::new(false),
            truncate_response: AtomicBool::new(false),
        })
    }
}

impl SyncTransport for Loopback {
    fn exchange(&self, body: &str) -> SyncResult<String> {
        let mut response = self.server.handle(body);
        if self.lose_response.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Timeout);
        }
        if self.truncate_response.swap(false, Ordering::SeqCst) {
            response.pop();
        }
        Ok(response)
    }
}

fn config() -> SessionConfig {
    SessionConfig::new("http://localhost/scripts/q.py").with_background(false)
}

fn client(
    transport: &Arc<Loopback>,
    session_id: &str,
    doc_id: &str,
    text: &str,
) -> (SyncSession, MemoryEndpoint, SharedDocument) {
    let session = SyncSession::with_id_generator(
        config(),
        Arc::clone(transport),
        FixedSessionId(session_id.into()),
    )
    .unwrap();
    let field = MemoryEndpoint::new(text);
    let doc = SharedDocument::new(DocumentSyncState::new(doc_id, field.clone()).unwrap());
    session.register(&[doc.clone()]).unwrap();
    (session, field, doc)
}

#[test]
fn edits_propagate_between_sessions() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(Arc::clone(&server));
    let (a, field_a, _) = client(&transport, "aaaaaaaa", "notes", "Hello");
    let (b, field_b, _) = client(&transport, "bbbbbbbb", "notes", "");

    a.run_cycle();
    assert_eq!(server.text("notes").as_deref(), Some("Hello"));
    b.run_cycle();
    assert_eq!(field_b.text(), "Hello");

    assert!(field_a.type_text(5, " world"));
    let report = a.run_cycle();
    assert!(report.client_changed);
    assert_eq!(server.text("notes").as_deref(), Some("Hello world"));

    let report = b.run_cycle();
    assert!(report.server_changed);
    assert_eq!(field_b.text(), "Hello world");
}

#[test]
fn concurrent_edits_converge() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(Arc::clone(&server));
    let (a, field_a, doc_a) = client(&transport, "aaaaaaaa", "notes", "Hello world");
    let (b, field_b, doc_b) = client(&transport, "bbbbbbbb", "notes", "");
    a.run_cycle();
    b.run_cycle();

    assert!(field_a.type_text(0, "A: "));
    assert!(field_b.type_text(11, "!"));
    a.run_cycle();
    b.run_cycle();
    a.run_cycle();

    assert_eq!(field_a.text(), "A: Hello world!");
    assert_eq!(field_b.text(), "A: Hello world!");
    assert_eq!(server.text("notes").as_deref(), Some("A: Hello world!"));

    // Server versions count the edits each view received, so they line up
    // once both sessions have run the same number of cycles.
    b.run_cycle();
    let (a, b) = (doc_a.lock(), doc_b.lock());
    assert_eq!(a.shadow_text(), "A: Hello world!");
    assert_eq!(b.shadow_text(), a.shadow_text());
    assert_eq!(a.server_version(), 3);
    assert_eq!(b.server_version(), a.server_version());
}

#[test]
fn lost_response_is_recovered_without_duplicating_edits() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(Arc::clone(&server));
    let (a, field_a, doc) = client(&transport, "aaaaaaaa", "notes", "Hello");
    a.run_cycle();

    assert!(field_a.type_text(5, "!"));
    transport.lose_response.store(true, Ordering::SeqCst);
    a.run_cycle();
    assert_eq!(server.text("notes").as_deref(), Some("Hello!"));
    assert_eq!(doc.lock().edit_stack().len(), 1);

    // The pending edit is resent and recognized as a repeat.
    a.run_cycle();
    assert_eq!(server.text("notes").as_deref(), Some("Hello!"));
    assert_eq!(field_a.text(), "Hello!");
    let state = doc.lock();
    assert!(state.edit_stack().is_empty());
    assert_eq!(state.client_version(), 2);
    assert_eq!(state.server_version(), 2);
}

#[test]
fn truncated_response_leaves_documents_untouched() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(Arc::clone(&server));
    let (a, field_a, doc) = client(&transport, "aaaaaaaa", "notes", "Hello");
    a.run_cycle();
    let server_version = doc.lock().server_version();

    server.set_text("notes", "Hello from elsewhere");
    transport.truncate_response.store(true, Ordering::SeqCst);
    let report = a.run_cycle();
    assert!(report.discarded);
    assert_eq!(field_a.text(), "Hello");
    assert_eq!(doc.lock().server_version(), server_version);

    let report = a.run_cycle();
    assert!(!report.discarded);
    assert_eq!(field_a.text(), "Hello from elsewhere");
}

#[test]
fn escaped_text_survives_the_round_trip() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(Arc::clone(&server));
    let text = "línea 1\nclave: valor 😀 100%\ttab\n";
    let (a, _, _) = client(&transport, "aaaaaaaa", "notes", text);
    a.run_cycle();
    assert_eq!(server.text("notes").as_deref(), Some(text));

    let reader = SyncSession::with_id_generator(
        config(),
        Arc::clone(&transport),
        RandomSessionIds::seeded(7),
    )
    .unwrap();
    let texts = reader.download(&["notes"]).unwrap();
    assert_eq!(texts.get("notes").map(String::as_str), Some(text));
}

#[test]
fn upload_and_download_over_tcp() {
    let server = Arc::new(ReferenceServer::new());
    let daemon = Daemon::spawn(Arc::clone(&server)).unwrap();
    let transport = TcpTransport::from_url(&daemon.url(), Duration::from_secs(5)).unwrap();
    let session = SyncSession::with_id_generator(
        SessionConfig::new(daemon.url()).with_background(false),
        transport,
        RandomSessionIds::seeded(11),
    )
    .unwrap();

    let mut texts = BTreeMap::new();
    texts.insert("a".to_string(), "first\nfile".to_string());
    texts.insert("b".to_string(), "second: file".to_string());
    session.upload(&texts).unwrap();
    assert_eq!(server.text("a").as_deref(), Some("first\nfile"));

    let downloaded = session.download(&["a", "b"]).unwrap();
    assert_eq!(downloaded, texts);
}

#[test]
fn download_of_unknown_document_yields_empty_text() {
    let server = Arc::new(ReferenceServer::new());
    let transport = Loopback::new(server);
    let session = SyncSession::with_id_generator(config(), transport, RandomSessionIds::seeded(3))
        .unwrap();
    // The server answers with an empty text, which still counts as a text.
    let texts = session.download(&["ghost"]).unwrap();
    assert_eq!(texts.get("ghost").map(String::as_str), Some(""));
    assert!(session.download(&["bad id"]).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn alternating_editors_converge(
        initial in text_strategy(),
        edits in prop::collection::vec((any::<bool>(), text_edit_strategy()), 0..12),
    ) {
        let server = Arc::new(ReferenceServer::new());
        let transport = Loopback::new(Arc::clone(&server));
        let (a, field_a, doc_a) = client(&transport, "aaaaaaaa", "doc", &initial);
        let (b, field_b, doc_b) = client(&transport, "bbbbbbbb", "doc", "");
        a.run_cycle();
        b.run_cycle();
        prop_assert_eq!(field_b.text(), initial);

        for (on_a, edit) in &edits {
            let (session, field) = if *on_a { (&a, &field_a) } else { (&b, &field_b) };
            prop_assert!(field.set_text(&edit.apply(&field.text())));
            session.run_cycle();
        }
        for _ in 0..2 {
            a.run_cycle();
            b.run_cycle();
        }

        let master = server.text("doc").unwrap_or_default();
        prop_assert_eq!(field_a.text(), master.clone());
        prop_assert_eq!(field_b.text(), master.clone());

        // Each session tracks the version of its own server view.
        for (session_id, doc) in [("aaaaaaaa", &doc_a), ("bbbbbbbb", &doc_b)] {
            let state = doc.lock();
            prop_assert_eq!(state.shadow_text(), master.as_str());
            prop_assert_eq!(
                Some(state.server_version()),
                server.server_version(session_id, "doc")
            );
        }
    }
}
