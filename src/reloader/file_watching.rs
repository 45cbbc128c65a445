use std::{
    collections::{BTreeSet, HashSet},
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind,
    recommended_watcher,
};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ReloadOutcome, coordinator::ReloadCoordinator, dispatcher::EventDispatcher};
use crate::{ReloadError, Result};

/// The set of paths a filesystem event must name to be considered.
///
/// Each configured file is recorded both as an absolute path and, when its
/// directory exists, with that directory canonicalized, so events reported
/// through a resolved symlink still match.
#[derive(Debug, Clone, Default)]
pub(crate) struct WatchTargets {
    files: HashSet<PathBuf>,
    directories: BTreeSet<PathBuf>,
}

impl WatchTargets {
    pub fn new(files: &[PathBuf]) -> Self {
        let cwd = env::current_dir().unwrap_or_default();
        let mut targets = Self::default();

        for file in files {
            let absolute = if file.is_absolute() {
                file.clone()
            } else {
                cwd.join(file)
            };

            let directory = absolute
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.clone());

            if let (Ok(canonical_dir), Some(name)) = (directory.canonicalize(), absolute.file_name())
            {
                targets.files.insert(canonical_dir.join(name));
            }

            targets.files.insert(absolute);
            targets.directories.insert(directory);
        }

        targets
    }

    /// Returns `true` if `path` is one of the configured files.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Directories that have to be watched to see every configured file.
    pub fn directories(&self) -> impl Iterator<Item = &PathBuf> {
        self.directories.iter()
    }

    /// Describes `event` if it is a relevant operation on a configured file.
    ///
    /// Only creation, content writes, renames and removals count; metadata
    /// changes and accesses are ignored.
    pub fn describe(&self, event: &Event) -> Option<String> {
        let operation = match event.kind {
            EventKind::Create(_) => "created",
            EventKind::Modify(ModifyKind::Name(_)) => "renamed",
            EventKind::Modify(ModifyKind::Metadata(_)) => return None,
            EventKind::Modify(_) => "written",
            EventKind::Remove(_) => "removed",
            _ => return None,
        };

        event
            .paths
            .iter()
            .find(|path| self.contains(path))
            .map(|path| format!("{operation} config file ({})", path.display()))
    }
}

/// Watches the directories of the configured files and drives debounced
/// reload passes.
pub(crate) struct FileWatchLoop {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    targets: WatchTargets,
    batch_interval: Duration,
}

impl FileWatchLoop {
    /// Creates the notification backend and registers every config directory.
    ///
    /// Directories rather than files are watched because editors often
    /// replace a file through create and rename, which some backends only
    /// report on the directory.
    ///
    /// # Errors
    /// Returns `ReloadError::FileWatcherInitError` if the backend cannot be
    /// created and `ReloadError::FileWatchError` if a directory cannot be
    /// watched.
    pub fn new(files: &[PathBuf], batch_interval: Duration) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(|e| ReloadError::FileWatcherInitError {
            details: e.to_string(),
        })?;

        let targets = WatchTargets::new(files);
        for directory in targets.directories() {
            watcher
                .watch(directory, RecursiveMode::NonRecursive)
                .map_err(|e| ReloadError::FileWatchError {
                    path: directory.clone(),
                    details: e.to_string(),
                })?;
            debug!("Watching config directory: {}", directory.display());
        }

        Ok(Self {
            watcher,
            event_rx,
            targets,
            batch_interval,
        })
    }

    /// Consumes filesystem events until `cancel` or `shutdown` fires or the
    /// backend closes its stream.
    ///
    /// The first relevant event arms the batch timer; events arriving before
    /// it fires only add to the reload reason. Each expiry runs exactly one
    /// non-forced reload pass. Leaving the loop releases the backend and
    /// stops the event dispatcher.
    pub async fn run(
        mut self,
        coordinator: Arc<ReloadCoordinator>,
        dispatcher: EventDispatcher,
        cancel: CancellationToken,
        shutdown: CancellationToken,
    ) {
        let mut pending: Vec<String> = Vec::new();

        let batch_sleep = tokio::time::sleep(self.batch_interval);
        tokio::pin!(batch_sleep);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = shutdown.cancelled() => break,

                received = self.event_rx.recv() => {
                    let Some(result) = received else {
                        break;
                    };

                    match result {
                        Ok(event) => {
                            let Some(reason) = self.targets.describe(&event) else {
                                continue;
                            };

                            info!("{reason}");
                            if pending.is_empty() {
                                batch_sleep.as_mut().reset(Instant::now() + self.batch_interval);
                            }
                            if !pending.contains(&reason) {
                                pending.push(reason);
                            }
                        }
                        Err(e) => warn!("File watcher error: {e}"),
                    }
                }

                _ = &mut batch_sleep, if !pending.is_empty() => {
                    let reason = pending.join("; ");
                    pending.clear();

                    match coordinator.reload(false).await {
                        Ok(ReloadOutcome::NotModified) => {}
                        Ok(ReloadOutcome::Reloaded { .. }) => dispatcher.push(reason),
                        Err(e) => error!("Failed to reload config: {e}"),
                    }
                }
            }
        }

        drop(self.watcher);
        dispatcher.stop();
        info!("Config file watching stopped");
    }
}
