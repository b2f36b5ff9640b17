//! File-backed endpoint.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use difsync_engine::{EndpointResult, ShareEndpoint};
use tracing::debug;

/// Shares the contents of a text file. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileEndpoint {
    path: PathBuf,
}

impl FileEndpoint {
    /// Creates an endpoint for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ShareEndpoint for FileEndpoint {
    fn read_text(&mut self) -> EndpointResult<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_text(&mut self, text: &str) -> EndpointResult<()> {
        debug!(path = %self.path.display(), chars = text.chars().count(), "writing file");
        fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let mut endpoint = FileEndpoint::new(dir.path().join("absent.txt"));
        assert_eq!(endpoint.read_text().unwrap(), "");
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = tempdir().unwrap();
        let mut endpoint = FileEndpoint::new(dir.path().join("notes.txt"));
        endpoint.write_text("línea\nzwei").unwrap();
        assert_eq!(endpoint.read_text().unwrap(), "línea\nzwei");
        assert!(endpoint.live_buffer().is_none());
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be read as text.
        let mut endpoint = FileEndpoint::new(dir.path());
        assert!(endpoint.read_text().is_err());
    }
}
