//! HTTP transport implementation.
//!
//! The request body is posted as the form field `q`, the way browser
//! clients of the gateway do. The actual HTTP client is abstracted via a
//! trait so hosts can plug in reqwest, ureq or an in-process server.

use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;

/// Name of the form field carrying the request body.
pub const QUERY_FIELD: &str = "q";

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Posts url-encoded form `fields` to `url` and returns the response
    /// body.
    fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
        timeout: Duration,
    ) -> SyncResult<String>;
}

/// HTTP-based sync transport.
pub struct HttpTransport<C: HttpClient> {
    url: String,
    client: C,
    cookie: Option<String>,
    timeout: Duration,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport posting to `url`.
    pub fn new(url: impl Into<String>, client: C) -> Self {
        Self {
            url: url.into(),
            client,
            cookie: None,
            timeout: Duration::from_secs(30),
            last_error: RwLock::new(None),
        }
    }

    /// Sends `cookie` as the `Cookie` header.
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    /// Sets the connect and read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the gateway URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn exchange(&self, body: &str) -> SyncResult<String> {
        debug!(url = %self.url, bytes = body.len(), "posting request");
        match self.client.post_form(
            &self.url,
            &[(QUERY_FIELD, body)],
            self.cookie.as_deref(),
            self.timeout,
        ) {
            Ok(response) => {
                *self.last_error.write() = None;
                Ok(response)
            }
            Err(e) => {
                *self.last_error.write() = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Posted = (String, Vec<(String, String)>, Option<String>, Duration);

    #[derive(Default)]
    struct TestClient {
        response: Mutex<Option<String>>,
        posted: Mutex<Vec<Posted>>,
    }

    impl HttpClient for TestClient {
        fn post_form(
            &self,
            url: &str,
            fields: &[(&str, &str)],
            cookie: Option<&str>,
            timeout: Duration,
        ) -> SyncResult<String> {
            self.posted.lock().push((
                url.to_string(),
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                cookie.map(str::to_string),
                timeout,
            ));
            self.response
                .lock()
                .clone()
                .ok_or_else(|| SyncError::transport_retryable("connection refused"))
        }
    }

    #[test]
    fn posts_body_as_q_field() {
        let client = TestClient::default();
        *client.response.lock() = Some("F:1:doc\n\n".into());
        let transport = HttpTransport::new("http://localhost/scripts/q.py", client)
            .with_cookie(Some("sid=7".into()))
            .with_timeout(Duration::from_secs(3));

        let response = transport.exchange("u:abc\nF:0:doc\nd:0:=1\n\n").unwrap();
        assert_eq!(response, "F:1:doc\n\n");

        let posted = transport.client.posted.lock();
        assert_eq!(posted.len(), 1);
        let (url, fields, cookie, timeout) = &posted[0];
        assert_eq!(url, "http://localhost/scripts/q.py");
        assert_eq!(
            fields,
            &vec![("q".to_string(), "u:abc\nF:0:doc\nd:0:=1\n\n".to_string())]
        );
        assert_eq!(cookie.as_deref(), Some("sid=7"));
        assert_eq!(*timeout, Duration::from_secs(3));
    }

    #[test]
    fn remembers_last_error() {
        let transport = HttpTransport::new("http://localhost/q", TestClient::default());
        assert!(transport.exchange("u:a\n\n").is_err());
        assert_eq!(
            transport.last_error().as_deref(),
            Some("transport error: connection refused")
        );

        *transport.client.response.lock() = Some("\n\n".into());
        transport.exchange("u:a\n\n").unwrap();
        assert!(transport.last_error().is_none());
    }
}
