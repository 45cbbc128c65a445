use std::{io::ErrorKind, path::Path};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::{ReloadError, Result};

/// Content of a configured file together with its fingerprint.
///
/// A missing file has no content and an empty fingerprint, so it contributes
/// nothing to the merge. An existing zero-length file has `Some` empty
/// content and still has to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileSnapshot {
    pub content: Option<Vec<u8>>,
    pub fingerprint: String,
}

impl FileSnapshot {
    /// Builds a snapshot of bytes that were read from an existing file.
    pub fn from_content(content: Vec<u8>) -> Self {
        let fingerprint = fingerprint(&content);
        Self {
            content: Some(content),
            fingerprint,
        }
    }
}

/// Reads a configured file and fingerprints its content.
///
/// # Errors
/// Returns `ReloadError::IoError` for any failure other than the file not
/// existing.
pub(crate) async fn read_snapshot(path: &Path) -> Result<FileSnapshot> {
    match fs::read(path).await {
        Ok(content) => Ok(FileSnapshot::from_content(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileSnapshot::default()),
        Err(e) => Err(ReloadError::io(&e, path)),
    }
}

/// Lowercase hex SHA-256 of `content`.
pub(crate) fn fingerprint(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{digest:x}")
}
