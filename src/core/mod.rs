use std::{
    fmt, io,
    path::{Path, PathBuf},
    result,
};

use thiserror::Error;

/// Error types for the configuration reloader.
///
/// Every failure that can abort a reload pass or the startup of the
/// watcher is represented here. None of them is fatal: the
/// reloader keeps the last successfully merged state when a pass fails.
#[derive(Error, Debug)]
pub enum ReloadError {
    /// A configured file exists but could not be read
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where the I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// A configured file does not contain valid JSON
    #[error("failed to parse JSON at '{path}': {details}")]
    JsonParseError {
        /// Path of the file that failed to parse
        path: PathBuf,
        /// Parse error details
        details: String,
    },

    /// A configured file is valid JSON but not an object at the top level
    #[error("expected a JSON object at the top level of '{path}', found {found}")]
    NotAnObject {
        /// Path of the offending file
        path: PathBuf,
        /// Kind of JSON value found instead
        found: &'static str,
    },

    /// A merged value could not be serialized back to JSON
    #[error("failed to serialize value of key '{key}': {details}")]
    SerializationError {
        /// Top-level key whose value failed to serialize
        key: String,
        /// Serialization error details
        details: String,
    },

    /// A delivered value does not match the type requested by the subscriber
    #[error("type mismatch for key '{key}': expected {expected_type}: {details}")]
    TypeMismatch {
        /// Key whose value was extracted
        key: String,
        /// Name of the requested type
        expected_type: &'static str,
        /// Deserialization error details
        details: String,
    },

    /// The filesystem notification backend could not be created
    #[error("failed to initialize file watcher: {details}")]
    FileWatcherInitError {
        /// File watcher initialization error details
        details: String,
    },

    /// A directory could not be registered with the notification backend
    #[error("file watcher error for '{path}': {details}")]
    FileWatchError {
        /// Directory being watched when the error occurred
        path: PathBuf,
        /// File watcher error details
        details: String,
    },

    /// `start` was called on a reloader that is already running
    #[error("config reloader already started")]
    AlreadyStarted,

    /// The reloader settings file could not be loaded
    #[error("failed to load reloader settings from '{path}': {details}")]
    ConfigLoadError {
        /// Path of the settings file
        path: PathBuf,
        /// Load error details
        details: String,
    },
}

/// A specialized `Result` type for reloader operations.
pub type Result<T> = result::Result<T, ReloadError>;

impl ReloadError {
    /// Creates an I/O error for a configured file.
    ///
    /// # Arguments
    ///
    /// * `error` - The underlying I/O error
    /// * `path` - Path of the file being read
    pub fn io(error: &io::Error, path: &Path) -> Self {
        ReloadError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }

    /// Creates a JSON parse error for a configured file.
    ///
    /// # Arguments
    ///
    /// * `error` - The underlying parse error
    /// * `path` - Path of the file that failed to parse
    pub fn json_parse(error: impl fmt::Display, path: &Path) -> Self {
        ReloadError::JsonParseError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }
}
