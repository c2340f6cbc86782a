//! Scoped staging files.

use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Temporary file holding a session's compressed, encrypted blob.
///
/// The file lives in the system temp directory and is deleted when this
/// value is dropped.
#[derive(Debug)]
pub struct StagingFile {
    inner: NamedTempFile,
}

impl StagingFile {
    /// Create an empty staging file
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory is not writable.
    pub fn new() -> io::Result<Self> {
        let inner = tempfile::Builder::new().prefix("peerfs-").tempfile()?;
        debug!(path = %inner.path().display(), "Created staging file");
        Ok(Self { inner })
    }

    /// Path of the staging file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}
