//! In-memory reference server.
//!
//! Implements the server half of the protocol: one master text per
//! document and, per (session, document) pair, a view holding the shadow,
//! a backup shadow for lost responses, both version counters and the
//! server's own pending edits.

use std::collections::HashMap;

use difsync_diff::{
    cleanup_efficiency, diff_main, from_delta, is_noop, patch_apply, patch_make, text2, to_delta,
};
use difsync_protocol::{parse_request, ClientLine, ResponseCommand};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Null,
    Raw,
    Delta,
}

#[derive(Debug, Clone)]
struct Action {
    username: String,
    filename: String,
    mode: Mode,
    force: bool,
    server_version: u64,
    client_version: u64,
    data: String,
}

#[derive(Debug, Clone, Default)]
struct View {
    shadow: String,
    backup_shadow: String,
    shadow_client_version: u64,
    shadow_server_version: u64,
    backup_shadow_server_version: u64,
    edit_stack: Vec<(u64, ResponseCommand)>,
}

#[derive(Debug, Default)]
struct ServerState {
    texts: HashMap<String, String>,
    views: HashMap<(String, String), View>,
}

/// Reference implementation of the sync server.
#[derive(Debug, Default)]
pub struct ReferenceServer {
    state: Mutex<ServerState>,
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

impl ReferenceServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Master text of a document, if the server has one.
    pub fn text(&self, filename: &str) -> Option<String> {
        self.state.lock().texts.get(filename).cloned()
    }

    /// Sets the master text of a document.
    pub fn set_text(&self, filename: &str, text: &str) {
        self.state
            .lock()
            .texts
            .insert(filename.to_string(), normalize(text));
    }

    /// Version of the next edit the server sends to `username` for
    /// `filename`, if that view exists. A client in step with its view
    /// holds the same server version.
    pub fn server_version(&self, username: &str, filename: &str) -> Option<u64> {
        self.state
            .lock()
            .views
            .get(&(username.to_string(), filename.to_string()))
            .map(|view| view.shadow_server_version)
    }

    /// Number of live views.
    pub fn view_count(&self) -> usize {
        self.state.lock().views.len()
    }

    /// Handles one request body and returns the response body, including
    /// the terminating blank line. Truncated requests get an empty answer.
    pub fn handle(&self, body: &str) -> String {
        let mut out = self.handle_raw(body);
        out.push('\n');
        out
    }

    /// Like [`handle`](Self::handle) but without the blank line, the way
    /// the socket daemon answers.
    pub fn handle_raw(&self, body: &str) -> String {
        let Ok(request) = parse_request(body) else {
            return String::new();
        };

        let mut actions = Vec::new();
        let mut username: Option<String> = None;
        let mut filename: Option<String> = None;
        let mut file_version = 0;
        let mut echo = false;
        for line in request.lines {
            let (mode, force, client_version, data) = match line {
                ClientLine::User { session_id, echo: e } => {
                    username = Some(session_id);
                    echo |= e;
                    continue;
                }
                ClientLine::File { server_version, id } => {
                    filename = Some(id);
                    file_version = server_version;
                    continue;
                }
                ClientLine::Nullify { id } => {
                    filename = Some(id);
                    (Mode::Null, false, 0, String::new())
                }
                ClientLine::Delta {
                    overwrite,
                    client_version,
                    delta,
                } => (Mode::Delta, overwrite, client_version, delta),
                ClientLine::Raw {
                    force,
                    client_version,
                    text,
                } => (Mode::Raw, force, client_version, text),
            };
            if let (Some(username), Some(filename)) = (&username, &filename) {
                actions.push(Action {
                    username: username.clone(),
                    filename: filename.clone(),
                    mode,
                    force,
                    server_version: file_version,
                    client_version,
                    data,
                });
            }
        }

        let mut state = self.state.lock();
        do_actions(&mut state, &actions, echo)
    }
}

fn do_actions(state: &mut ServerState, actions: &[Action], echo: bool) -> String {
    let ServerState { texts, views } = state;
    let mut output = String::new();
    let mut last: Option<(String, String)> = None;
    let mut open = false;
    let mut delta_ok = true;

    for (index, action) in actions.iter().enumerate() {
        let key = (action.username.clone(), action.filename.clone());
        if !open {
            open = true;
            delta_ok = true;
        }

        if action.mode == Mode::Null {
            texts.remove(&action.filename);
            views.remove(&key);
            open = false;
            continue;
        }

        let view = views.entry(key.clone()).or_default();
        let mut force = action.force;

        if action.server_version != view.shadow_server_version
            && action.server_version == view.backup_shadow_server_version
        {
            // The client missed our last response.
            view.shadow = view.backup_shadow.clone();
            view.shadow_server_version = view.backup_shadow_server_version;
            view.edit_stack.clear();
        }
        view.edit_stack
            .retain(|(version, _)| *version > action.server_version);

        match action.mode {
            Mode::Raw => {
                delta_ok = true;
                view.shadow = action.data.clone();
                view.shadow_client_version = action.client_version;
                view.shadow_server_version = action.server_version;
                view.backup_shadow = view.shadow.clone();
                view.backup_shadow_server_version = view.shadow_server_version;
                view.edit_stack.clear();
                if force || !texts.contains_key(&action.filename) {
                    texts.insert(action.filename.clone(), normalize(&action.data));
                }
            }
            Mode::Delta => {
                if action.server_version != view.shadow_server_version
                    || action.client_version > view.shadow_client_version
                {
                    delta_ok = false;
                } else if action.client_version == view.shadow_client_version {
                    let diffs = from_delta(&view.shadow, &action.data).ok();
                    view.shadow_client_version += 1;
                    match diffs {
                        None => delta_ok = false,
                        Some(diffs) => {
                            let patches = patch_make(&view.shadow, &diffs);
                            view.shadow = text2(&diffs);
                            view.backup_shadow = view.shadow.clone();
                            view.backup_shadow_server_version = view.shadow_server_version;

                            let master = match texts.get(&action.filename) {
                                None => {
                                    force = false;
                                    view.shadow.clone()
                                }
                                Some(text) if force => {
                                    if is_noop(&diffs) {
                                        text.clone()
                                    } else {
                                        view.shadow.clone()
                                    }
                                }
                                Some(text) => patch_apply(&patches, text).0,
                            };
                            texts.insert(action.filename.clone(), normalize(&master));
                        }
                    }
                }
                // An older client version is a repeat; nothing to do.
            }
            Mode::Null => {}
        }

        let boundary = actions
            .get(index + 1)
            .map_or(true, |next| next.username != key.0 || next.filename != key.1);
        if boundary {
            output.push_str(&generate_diffs(
                view,
                texts,
                &key,
                last.as_ref(),
                echo,
                force,
                delta_ok,
            ));
            last = Some(key);
            open = false;
        }
    }
    output
}

fn generate_diffs(
    view: &mut View,
    texts: &mut HashMap<String, String>,
    key: &(String, String),
    last: Option<&(String, String)>,
    echo: bool,
    mut force: bool,
    delta_ok: bool,
) -> String {
    let (username, filename) = key;
    let mut output = String::new();
    let same_user = last.is_some_and(|(u, _)| u == username);
    if echo && !same_user {
        output.push_str(
            &ResponseCommand::User {
                session_id: username.clone(),
            }
            .to_string(),
        );
    }
    if last != Some(key) {
        output.push_str(
            &ResponseCommand::File {
                client_version: view.shadow_client_version,
                id: filename.clone(),
            }
            .to_string(),
        );
    }

    if !texts.contains_key(filename) {
        force = false;
        if delta_ok {
            texts.insert(filename.clone(), view.shadow.clone());
        }
    }
    let master = texts.get(filename).cloned();

    let master = if delta_ok {
        let master = master.unwrap_or_default();
        let mut diffs = diff_main(&view.shadow, &master, true);
        cleanup_efficiency(&mut diffs);
        let version = view.shadow_server_version;
        view.edit_stack.push((
            version,
            ResponseCommand::Delta {
                overwrite: force,
                server_version: version,
                delta: to_delta(&diffs),
            },
        ));
        view.shadow_server_version += 1;
        master
    } else {
        // The client's delta did not fit; send the whole text.
        view.shadow_client_version += 1;
        let version = view.shadow_server_version;
        let (force, master) = match master {
            Some(master) => (true, master),
            None => (false, String::new()),
        };
        view.edit_stack.push((
            version,
            ResponseCommand::Raw {
                force,
                server_version: version,
                text: master.clone(),
            },
        ));
        master
    };
    view.shadow = master;

    for (_, edit) in &view.edit_stack {
        output.push_str(&edit.to_string());
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_dump_creates_text() {
        let server = ReferenceServer::new();
        let response = server.handle("u:alice\nF:0:doc\nr:1:Hello%20world\n\n");
        assert_eq!(response, "F:1:doc\nd:0:=11\n\n");
        assert_eq!(server.text("doc").as_deref(), Some("Hello world"));
        assert_eq!(server.view_count(), 1);
        assert_eq!(server.server_version("alice", "doc"), Some(1));
        assert_eq!(server.server_version("bob", "doc"), None);
    }

    #[test]
    fn delta_is_merged_and_echoed_to_other_views() {
        let server = ReferenceServer::new();
        server.handle("u:alice\nF:0:doc\nr:1:Hello\n\n");
        server.handle("u:bob\nF:0:doc\nr:1:Hello\n\n");

        let response = server.handle("u:alice\nF:1:doc\nd:1:=5\t+ world\n\n");
        assert_eq!(response, "F:2:doc\nd:1:=11\n\n");
        assert_eq!(server.text("doc").as_deref(), Some("Hello world"));

        let response = server.handle("u:bob\nF:1:doc\nd:1:=5\n\n");
        assert_eq!(response, "F:2:doc\nd:1:=5\t+ world\n\n");
    }

    #[test]
    fn existing_text_wins_over_unforced_dump() {
        let server = ReferenceServer::new();
        server.set_text("doc", "server");
        let response = server.handle("u:alice\nF:0:doc\nr:1:client\n\n");
        assert_eq!(server.text("doc").as_deref(), Some("server"));
        assert!(response.starts_with("F:1:doc\nd:0:"));
    }

    #[test]
    fn forced_dump_overwrites() {
        let server = ReferenceServer::new();
        server.set_text("doc", "old");
        server.handle("u:x\nF:0:doc\nR:0:new\n\n");
        assert_eq!(server.text("doc").as_deref(), Some("new"));
    }

    #[test]
    fn bad_delta_gets_raw_text() {
        let server = ReferenceServer::new();
        server.handle("u:alice\nF:0:doc\nr:1:abc\n\n");
        let response = server.handle("u:alice\nF:1:doc\nd:1:=9\n\n");
        assert_eq!(response, "F:2:doc\nR:1:abc\n\n");
    }

    #[test]
    fn nullify_forgets_document() {
        let server = ReferenceServer::new();
        server.handle("u:alice\nF:0:doc\nr:1:abc\n\n");
        let response = server.handle("u:alice\nN:doc\n\n");
        assert_eq!(response, "\n");
        assert!(server.text("doc").is_none());
        assert_eq!(server.view_count(), 0);
    }

    #[test]
    fn echoes_user_on_request() {
        let server = ReferenceServer::new();
        let response = server.handle("U:alice\nF:0:doc\nr:1:x\n\n");
        assert_eq!(response, "u:alice\nF:1:doc\nd:0:=1\n\n");
    }

    #[test]
    fn truncated_request_gets_no_answer() {
        let server = ReferenceServer::new();
        assert_eq!(server.handle_raw("u:alice\nF:0:doc\nr:1:x\n"), "");
        assert!(server.text("doc").is_none());
    }

    #[test]
    fn lost_response_rolls_back_to_backup() {
        let server = ReferenceServer::new();
        server.set_text("doc", "abc");
        server.handle("u:alice\nF:0:doc\nr:1:abc\n\n");
        // Response to this one is "lost": server moves to version 2.
        server.handle("u:alice\nF:1:doc\nd:1:=3\n\n");
        // Client retries from version 1 with the same edit.
        let response = server.handle("u:alice\nF:1:doc\nd:1:=3\n\n");
        assert_eq!(response, "F:2:doc\nd:1:=3\n\n");
    }
}
