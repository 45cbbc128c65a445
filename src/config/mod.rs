//! Settings for the configuration reloader itself.
//!
//! These describe which JSON files are merged and how quickly filesystem
//! activity turns into a reload. They can be built in code or loaded from a
//! TOML file.

mod duration_ms;
#[cfg(test)]
mod tests;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{ReloadError, Result};

/// Default delay between the first filesystem event and the reload it triggers.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Default upper bound on how long the event pump idles before rechecking its queue.
pub const DEFAULT_EVENT_IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Reloader settings.
///
/// ```toml
/// files = ["conf.d/base.json", "conf.d/local.json"]
/// batch_interval_ms = 500
/// event_idle_interval_ms = 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloaderConfig {
    /// JSON files to merge, lowest precedence first.
    pub files: Vec<PathBuf>,

    /// Debounce window applied to filesystem events.
    #[serde(rename = "batch_interval_ms", with = "duration_ms")]
    pub batch_interval: Duration,

    /// Longest idle wait of the event pump between queue checks.
    #[serde(rename = "event_idle_interval_ms", with = "duration_ms")]
    pub event_idle_interval: Duration,
}

impl Default for ReloaderConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            batch_interval: DEFAULT_BATCH_INTERVAL,
            event_idle_interval: DEFAULT_EVENT_IDLE_INTERVAL,
        }
    }
}

impl ReloaderConfig {
    /// Creates settings for the given files with default intervals.
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the debounce window.
    pub fn with_batch_interval(mut self, batch_interval: Duration) -> Self {
        self.batch_interval = batch_interval;
        self
    }

    /// Loads settings from a TOML file.
    ///
    /// Relative entries in `files` are resolved against the directory of the
    /// settings file.
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::ConfigLoadError` if the file cannot be read or
    /// is not valid settings TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ReloadError::ConfigLoadError {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        let mut config: Self =
            toml::from_str(&content).map_err(|e| ReloadError::ConfigLoadError {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;

        if let Some(base_dir) = path.parent() {
            config.files = config
                .files
                .into_iter()
                .map(|file| {
                    if file.is_relative() {
                        base_dir.join(file)
                    } else {
                        file
                    }
                })
                .collect();
        }

        Ok(config)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::ConfigLoadError` if the text is not valid settings TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ReloadError::ConfigLoadError {
            path: PathBuf::from("string"),
            details: e.to_string(),
        })
    }
}
