//! Socket daemon serving a [`ReferenceServer`] on localhost.
//!
//! Each connection carries one request: lines are read up to the blank
//! line (or end of stream), the answer is written without the blank line
//! and the connection is closed.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::server::ReferenceServer;

/// A running daemon. Stops when dropped.
pub struct Daemon {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Binds an ephemeral localhost port and serves `server` on it.
    pub fn spawn(server: Arc<ReferenceServer>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("difsync-daemon".into())
            .spawn(move || {
                for stream in listener.incoming() {
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    match stream {
                        Ok(stream) => {
                            if let Err(e) = serve(&server, stream) {
                                warn!(error = %e, "connection failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            })?;
        Ok(Self {
            addr,
            stop,
            handle: Some(handle),
        })
    }

    /// Address the daemon listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `telnet://` URL of the daemon.
    pub fn url(&self) -> String {
        format!("telnet://{}:{}", self.addr.ip(), self.addr.port())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake the accept loop.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(server: &ReferenceServer, stream: TcpStream) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut body = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let blank = line.trim_end_matches(['\r', '\n']).is_empty();
        body.push_str(&line);
        if blank {
            break;
        }
    }
    debug!(bytes = body.len(), "request received");
    let mut stream = stream;
    stream.write_all(server.handle_raw(&body).as_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::Shutdown;

    #[test]
    fn answers_one_request_per_connection() {
        let server = Arc::new(ReferenceServer::new());
        let daemon = Daemon::spawn(Arc::clone(&server)).unwrap();
        assert!(daemon.url().starts_with("telnet://127.0.0.1:"));

        let mut stream = TcpStream::connect(daemon.addr()).unwrap();
        stream.write_all(b"u:abcdefgh\nF:0:doc\nr:1:x\n\n").unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        assert_eq!(response, "F:1:doc\nd:0:=1\n");
        assert_eq!(server.text("doc").as_deref(), Some("x"));
    }
}
