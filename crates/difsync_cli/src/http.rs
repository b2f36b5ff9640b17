//! reqwest-backed HTTP client for gateway URLs.

use std::time::Duration;

use difsync_engine::{HttpClient, SyncError, SyncResult};
use reqwest::blocking::Client;
use reqwest::header::COOKIE;

/// Blocking HTTP client posting form bodies with reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Builds a client.
    pub fn new() -> SyncResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::transport_fatal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout
    } else if e.is_builder() {
        SyncError::transport_fatal(e.to_string())
    } else {
        SyncError::transport_retryable(e.to_string())
    }
}

impl HttpClient for ReqwestClient {
    fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
        timeout: Duration,
    ) -> SyncResult<String> {
        let mut request = self.client.post(url).form(fields).timeout(timeout);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().map_err(map_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport {
                message: format!("gateway answered {status}"),
                retryable: status.is_server_error(),
            });
        }
        response.text().map_err(map_error)
    }
}
