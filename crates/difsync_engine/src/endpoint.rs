//! Endpoint capability interface.
//!
//! An endpoint is whatever holds the user-visible copy of a document: a
//! text field, a file, a list. The engine only reads and writes its text;
//! endpoints that can be edited in place also expose a [`LiveBuffer`] so
//! remote edits can be merged without disturbing the cursor.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// Result type for endpoint callbacks.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Errors raised by endpoint callbacks.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// I/O failure of a file-backed endpoint.
    #[error("endpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An edit addressed text past the end of the buffer.
    #[error("offset {at} out of range for {len} chars")]
    OutOfRange {
        /// Requested offset in chars.
        at: usize,
        /// Buffer length in chars.
        len: usize,
    },

    /// Any other failure reported by the endpoint.
    #[error("{0}")]
    Failed(String),
}

impl EndpointError {
    /// Create a generic endpoint failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A shareable endpoint.
///
/// Calls are made from the session worker; implementations that must run
/// on a specific thread marshal the call themselves.
pub trait ShareEndpoint: Send {
    /// Reads the current text.
    fn read_text(&mut self) -> EndpointResult<String>;

    /// Replaces the whole text.
    fn write_text(&mut self, text: &str) -> EndpointResult<()>;

    /// Tracked offsets (caret, selection bounds) in chars.
    fn cursor_offsets(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Restores tracked offsets after a merge, in the order returned by
    /// [`cursor_offsets`](Self::cursor_offsets).
    fn set_cursor_offsets(&mut self, _offsets: &[usize]) {}

    /// In-place editing access, if supported.
    fn live_buffer(&mut self) -> Option<&mut dyn LiveBuffer> {
        None
    }
}

/// Text that can be edited in place.
///
/// Offsets and lengths are in chars.
pub trait LiveBuffer {
    /// Current text.
    fn text(&self) -> EndpointResult<String>;

    /// Inserts `text` before the char at `at`.
    fn insert(&mut self, at: usize, text: &str) -> EndpointResult<()>;

    /// Removes `len` chars starting at `at`.
    fn remove(&mut self, at: usize, len: usize) -> EndpointResult<()>;

    /// Blocks or allows user edits.
    fn set_editable(&mut self, editable: bool);
}

#[derive(Debug)]
struct TextField {
    chars: Vec<char>,
    caret: usize,
    selection: Option<(usize, usize)>,
    editable: bool,
}

impl TextField {
    fn check(&self, at: usize) -> EndpointResult<()> {
        if at > self.chars.len() {
            return Err(EndpointError::OutOfRange {
                at,
                len: self.chars.len(),
            });
        }
        Ok(())
    }
}

/// In-memory text field with a caret and an optional selection.
///
/// Clones share the same field, so a host can keep one handle for user
/// edits while the engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryEndpoint {
    field: Arc<Mutex<TextField>>,
}

impl MemoryEndpoint {
    /// Creates a field holding `text` with the caret at the start.
    pub fn new(text: &str) -> Self {
        Self {
            field: Arc::new(Mutex::new(TextField {
                chars: text.chars().collect(),
                caret: 0,
                selection: None,
                editable: true,
            })),
        }
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.field.lock().chars.iter().collect()
    }

    /// Replaces the text as a user would. Returns false while a merge is
    /// running.
    pub fn set_text(&self, text: &str) -> bool {
        let mut field = self.field.lock();
        if !field.editable {
            return false;
        }
        field.chars = text.chars().collect();
        let len = field.chars.len();
        field.caret = field.caret.min(len);
        field.selection = field.selection.map(|(s, e)| (s.min(len), e.min(len)));
        true
    }

    /// Types `text` at `at` as a user would, moving the caret after it.
    /// Returns false while a merge is running or if `at` is out of range.
    pub fn type_text(&self, at: usize, text: &str) -> bool {
        let mut field = self.field.lock();
        if !field.editable || at > field.chars.len() {
            return false;
        }
        let inserted: Vec<char> = text.chars().collect();
        let n = inserted.len();
        field.chars.splice(at..at, inserted);
        field.caret = at + n;
        true
    }

    /// Whether user edits are currently allowed.
    pub fn is_editable(&self) -> bool {
        self.field.lock().editable
    }

    /// Caret offset in chars.
    pub fn caret(&self) -> usize {
        self.field.lock().caret
    }

    /// Moves the caret, clamped to the text.
    pub fn set_caret(&self, at: usize) {
        let mut field = self.field.lock();
        field.caret = at.min(field.chars.len());
    }

    /// Selection bounds in chars.
    pub fn selection(&self) -> Option<(usize, usize)> {
        self.field.lock().selection
    }

    /// Selects `[start, end)`, clamped to the text.
    pub fn select(&self, start: usize, end: usize) {
        let mut field = self.field.lock();
        let len = field.chars.len();
        field.selection = Some((start.min(len), end.min(len)));
    }
}

impl Default for MemoryEndpoint {
    fn default() -> Self {
        Self::new("")
    }
}

impl ShareEndpoint for MemoryEndpoint {
    fn read_text(&mut self) -> EndpointResult<String> {
        Ok(self.text())
    }

    fn write_text(&mut self, text: &str) -> EndpointResult<()> {
        let mut field = self.field.lock();
        field.chars = text.chars().collect();
        let len = field.chars.len();
        field.caret = field.caret.min(len);
        field.selection = field.selection.map(|(s, e)| (s.min(len), e.min(len)));
        Ok(())
    }

    fn cursor_offsets(&self) -> Vec<usize> {
        let field = self.field.lock();
        let mut offsets = vec![field.caret];
        if let Some((start, end)) = field.selection {
            offsets.push(start);
            offsets.push(end);
        }
        offsets
    }

    fn set_cursor_offsets(&mut self, offsets: &[usize]) {
        let mut field = self.field.lock();
        let len = field.chars.len();
        if let Some(caret) = offsets.first() {
            field.caret = (*caret).min(len);
        }
        if let (Some(start), Some(end)) = (offsets.get(1), offsets.get(2)) {
            field.selection = Some(((*start).min(len), (*end).min(len)));
        }
    }

    fn live_buffer(&mut self) -> Option<&mut dyn LiveBuffer> {
        Some(self)
    }
}

impl LiveBuffer for MemoryEndpoint {
    fn text(&self) -> EndpointResult<String> {
        Ok(MemoryEndpoint::text(self))
    }

    fn insert(&mut self, at: usize, text: &str) -> EndpointResult<()> {
        let mut field = self.field.lock();
        field.check(at)?;
        field.chars.splice(at..at, text.chars());
        Ok(())
    }

    fn remove(&mut self, at: usize, len: usize) -> EndpointResult<()> {
        let mut field = self.field.lock();
        field.check(at + len)?;
        field.chars.drain(at..at + len);
        Ok(())
    }

    fn set_editable(&mut self, editable: bool) {
        self.field.lock().editable = editable;
    }
}
