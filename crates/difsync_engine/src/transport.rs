//! Transport layer abstraction for sync exchanges.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{SyncError, SyncResult};

/// A sync transport performs one blocking request/response exchange.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, raw TCP, in-process servers, mocks).
pub trait SyncTransport: Send + Sync {
    /// Sends a complete request body and returns the raw response body.
    fn exchange(&self, body: &str) -> SyncResult<String>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for std::sync::Arc<T> {
    fn exchange(&self, body: &str) -> SyncResult<String> {
        (**self).exchange(body)
    }
}

/// A mock transport for testing.
///
/// Responses are returned in the order they were queued; when the queue is
/// empty every exchange fails with a retryable transport error. Requests
/// are recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<SyncResult<String>>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response body.
    pub fn push_response(&self, body: impl Into<String>) {
        self.responses.lock().push_back(Ok(body.into()));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: SyncError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of exchanges performed.
    pub fn exchange_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl SyncTransport for MockTransport {
    fn exchange(&self, body: &str) -> SyncResult<String> {
        self.requests.lock().push(body.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_retryable("no mock response queued")))
    }
}
