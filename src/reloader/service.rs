use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::{
    KeyChange, ReloadOutcome,
    coordinator::ReloadCoordinator,
    dispatcher::{EventDispatcher, EventReceiver},
    file_watching::FileWatchLoop,
};
use crate::{ReloadError, Result, config::ReloaderConfig};

/// Reason attached to the event of the first pass performed by `start`.
const INITIAL_LOAD_REASON: &str = "initial load";

struct Inner {
    files: Vec<PathBuf>,
    batch_interval: Duration,
    coordinator: Arc<ReloadCoordinator>,
    dispatcher: EventDispatcher,
    shutdown: CancellationToken,
    started: AtomicBool,
}

/// Hot-reloading configuration assembled from several JSON files.
///
/// Files are merged in the order they were configured. Subscribers register
/// a callback per top-level key and are called only when the serialized
/// value of that key changes, including once with `raw: None` when the key
/// disappears. Handles are cheap to clone and share one reloader.
///
/// Callbacks run synchronously while the reload lock is held. They must be
/// fast and must not await other methods of the same reloader.
#[derive(Clone)]
pub struct ConfigReloader {
    inner: Arc<Inner>,
}

impl ConfigReloader {
    /// Creates a reloader for `files` with the given debounce window.
    pub fn new<I, P>(files: I, batch_interval: Duration) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::from_config(ReloaderConfig::new(files).with_batch_interval(batch_interval))
    }

    /// Creates a reloader from settings.
    pub fn from_config(config: ReloaderConfig) -> Self {
        let ReloaderConfig {
            files,
            batch_interval,
            event_idle_interval,
        } = config;

        Self {
            inner: Arc::new(Inner {
                coordinator: Arc::new(ReloadCoordinator::new(files.clone())),
                dispatcher: EventDispatcher::new(event_idle_interval),
                files,
                batch_interval,
                shutdown: CancellationToken::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a callback for changes of a top-level key.
    ///
    /// Any JSON object key is accepted, the empty string included. Several
    /// callbacks may be registered on the same key; they run in registration
    /// order. Subscriptions cannot be removed.
    pub async fn subscribe<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(&KeyChange) + Send + Sync + 'static,
    {
        self.inner
            .coordinator
            .subscribe(key.into(), Arc::new(callback))
            .await;
    }

    /// Loads the configuration and starts watching the files.
    ///
    /// The watcher is registered first, then a forced pass runs before this
    /// returns, so every subscriber of a present key has been called once. The watch loop then
    /// runs in the background until `cancel` fires or `stop` is called.
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::AlreadyStarted` on a second call, a file watcher
    /// error, or the error of the first pass if a file cannot be read or
    /// parsed. After a failure `start` may be called again.
    #[instrument(skip(self, cancel), fields(files = self.inner.files.len()))]
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ReloadError::AlreadyStarted);
        }

        let watch_loop = match self.prepare().await {
            Ok(watch_loop) => watch_loop,
            Err(e) => {
                self.inner.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        tokio::spawn(watch_loop.run(
            Arc::clone(&self.inner.coordinator),
            self.inner.dispatcher.clone(),
            cancel,
            self.inner.shutdown.clone(),
        ));

        info!("Config reloader started");
        Ok(())
    }

    /// Runs a forced reload pass regardless of file fingerprints.
    ///
    /// On success an event carrying `reason` is published.
    ///
    /// # Errors
    ///
    /// Returns the I/O or parse error that aborted the pass.
    #[instrument(skip(self, reason))]
    pub async fn force_reload(&self, reason: impl Into<String>) -> Result<ReloadOutcome> {
        let outcome = self.inner.coordinator.reload(true).await?;
        self.inner.dispatcher.push(reason);
        Ok(outcome)
    }

    /// Time of the last successful reload pass, if any.
    pub async fn reload_time(&self) -> Option<DateTime<Utc>> {
        self.inner.coordinator.reload_time().await
    }

    /// Shared channel of reload events.
    ///
    /// Events are recorded from the first call on.
    ///
    /// # Panics
    ///
    /// The first call spawns the delivery task and panics if it is made
    /// outside a Tokio runtime.
    pub fn events(&self) -> EventReceiver {
        self.inner.dispatcher.events()
    }

    /// Stops watching files and shuts the event channel down.
    ///
    /// Undelivered events are discarded. A pass that is already running
    /// completes normally.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.dispatcher.stop();
    }

    /// Configured files, lowest precedence first.
    pub fn files(&self) -> &[PathBuf] {
        &self.inner.files
    }

    /// Registers the watcher before the first pass so an edit made while
    /// that pass runs still reaches the watch loop.
    async fn prepare(&self) -> Result<FileWatchLoop> {
        let watch_loop = FileWatchLoop::new(&self.inner.files, self.inner.batch_interval)?;

        self.inner.coordinator.reload(true).await?;
        self.inner.dispatcher.push(INITIAL_LOAD_REASON);

        Ok(watch_loop)
    }
}
