//! Raw TCP transport for `telnet://host:port` gateways.
//!
//! The daemon accepts a request on a plain socket, answers and closes the
//! connection.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;

/// URL scheme handled by [`TcpTransport`].
pub const TELNET_SCHEME: &str = "telnet://";

const DEFAULT_PORT: u16 = 23;

/// Sync transport over a raw TCP connection.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpTransport {
    /// Parses a `telnet://host[:port]` URL. The port defaults to 23.
    pub fn from_url(url: &str, timeout: Duration) -> SyncResult<Self> {
        let rest = url
            .strip_prefix(TELNET_SCHEME)
            .ok_or_else(|| SyncError::InvalidConfig(format!("not a telnet URL: {url}")))?;
        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| SyncError::InvalidConfig(format!("invalid port in {url}")))?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(SyncError::InvalidConfig(format!("missing host in {url}")));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
        })
    }

    /// Target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn connect(&self) -> SyncResult<TcpStream> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| SyncError::transport_fatal(format!("cannot resolve {}: {e}", self.host)))?;
        let mut last = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last = Some(e),
            }
        }
        Err(match last {
            Some(e) => io_error(e),
            None => SyncError::transport_fatal(format!("no address for {}", self.host)),
        })
    }
}

fn io_error(e: std::io::Error) -> SyncError {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => SyncError::Timeout,
        _ => SyncError::transport_retryable(e.to_string()),
    }
}

impl SyncTransport for TcpTransport {
    fn exchange(&self, body: &str) -> SyncResult<String> {
        debug!(host = %self.host, port = self.port, bytes = body.len(), "sending request");
        let mut stream = self.connect()?;
        stream.set_read_timeout(Some(self.timeout)).map_err(io_error)?;
        stream.set_write_timeout(Some(self.timeout)).map_err(io_error)?;
        stream.write_all(body.as_bytes()).map_err(io_error)?;
        stream.shutdown(Shutdown::Write).map_err(io_error)?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).map_err(io_error)?;
        let mut response = String::from_utf8(raw)
            .map_err(|e| SyncError::transport_fatal(format!("response is not UTF-8: {e}")))?;
        // The socket closes right after the last line; restore the blank
        // line terminator the framing expects.
        response.push('\n');
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parses_urls() {
        let t = TcpTransport::from_url("telnet://localhost:3017", Duration::from_secs(1)).unwrap();
        assert_eq!(t.host(), "localhost");
        assert_eq!(t.port(), 3017);

        let t = TcpTransport::from_url("telnet://example.org", Duration::from_secs(1)).unwrap();
        assert_eq!(t.port(), 23);

        assert!(TcpTransport::from_url("http://example.org", Duration::from_secs(1)).is_err());
        assert!(TcpTransport::from_url("telnet://:80", Duration::from_secs(1)).is_err());
        assert!(TcpTransport::from_url("telnet://h:port", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn exchanges_over_a_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = String::new();
            socket.read_to_string(&mut request).unwrap();
            socket.write_all(b"F:1:doc\n").unwrap();
            request
        });

        let transport = TcpTransport::from_url(
            &format!("telnet://127.0.0.1:{port}"),
            Duration::from_secs(5),
        )
        .unwrap();
        let response = transport.exchange("u:abc\nF:0:doc\nr:1:x\n\n").unwrap();
        assert_eq!(response, "F:1:doc\n\n");
        assert_eq!(server.join().unwrap(), "u:abc\nF:0:doc\nr:1:x\n\n");
    }
}
