use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{
    diff::{self, KeyCallback, KeySubscription},
    fingerprint::{self, FileSnapshot},
    merging,
};
use crate::Result;

/// Result of a reload pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// No configured file changed and the pass was not forced.
    NotModified,
    /// Files were merged and subscribers diffed.
    Reloaded {
        /// Keys whose subscribers were notified, in subscription order.
        changed_keys: Vec<String>,
    },
}

impl ReloadOutcome {
    /// Returns `true` if the pass merged and diffed the configuration.
    pub fn is_reloaded(&self) -> bool {
        matches!(self, ReloadOutcome::Reloaded { .. })
    }
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    fingerprint: String,
}

#[derive(Debug, Default)]
struct ReloadState {
    files: Vec<FileEntry>,
    subscriptions: Vec<KeySubscription>,
    last_reload: Option<DateTime<Utc>>,
}

/// Runs reload passes one at a time over the configured files.
///
/// Every pass, the subscription list and the reload time live behind a
/// single async mutex, so passes from startup, the watch loop and forced
/// reloads never interleave. A pass that has to wait still performs its own
/// fresh read once it gets the lock.
#[derive(Debug)]
pub(crate) struct ReloadCoordinator {
    state: Mutex<ReloadState>,
}

impl ReloadCoordinator {
    pub fn new(files: Vec<PathBuf>) -> Self {
        let files = files
            .into_iter()
            .map(|path| FileEntry {
                path,
                fingerprint: String::new(),
            })
            .collect();

        Self {
            state: Mutex::new(ReloadState {
                files,
                ..ReloadState::default()
            }),
        }
    }

    pub async fn subscribe(&self, key: String, callback: KeyCallback) {
        let mut state = self.state.lock().await;
        state
            .subscriptions
            .push(KeySubscription::new(key, callback));
    }

    pub async fn reload_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_reload
    }

    /// Performs one reload pass.
    ///
    /// Unless `forced`, the pass stops early with `ReloadOutcome::NotModified`
    /// when every file fingerprint matches the last committed one.
    ///
    /// # Errors
    /// Returns the first I/O or parse failure. Fingerprints and the reload
    /// time are left untouched in that case.
    #[instrument(skip(self))]
    pub async fn reload(&self, forced: bool) -> Result<ReloadOutcome> {
        let mut state = self.state.lock().await;

        let mut snapshots = Vec::with_capacity(state.files.len());
        for entry in &state.files {
            snapshots.push(fingerprint::read_snapshot(&entry.path).await?);
        }

        let any_changed = state
            .files
            .iter()
            .zip(&snapshots)
            .any(|(entry, snapshot)| entry.fingerprint != snapshot.fingerprint);

        if !any_changed && !forced {
            debug!("Configuration files not modified");
            return Ok(ReloadOutcome::NotModified);
        }

        let merged = merge_snapshots(&state.files, &snapshots)?;
        let changed_keys = diff::dispatch_changes(&mut state.subscriptions, &merged)?;

        for (entry, snapshot) in state.files.iter_mut().zip(snapshots) {
            entry.fingerprint = snapshot.fingerprint;
        }
        state.last_reload = Some(Utc::now());

        info!(?changed_keys, "Configuration reloaded");
        Ok(ReloadOutcome::Reloaded { changed_keys })
    }
}

fn merge_snapshots(files: &[FileEntry], snapshots: &[FileSnapshot]) -> Result<Map<String, Value>> {
    let mut documents = Vec::with_capacity(files.len());

    for (entry, snapshot) in files.iter().zip(snapshots) {
        if let Some(content) = &snapshot.content {
            documents.push(merging::parse_document(&entry.path, content)?);
        }
    }

    Ok(merging::merge_documents(documents))
}
