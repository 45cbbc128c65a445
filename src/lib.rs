//! cfg-reloader - hot reloading of JSON configuration split across files.
//!
//! Long-running services often split their configuration into several
//! files, with later files overriding earlier ones. This crate merges those
//! files, watches them for changes, and notifies subsystems only about the
//! top-level keys whose values actually changed.
//!
//! - Deterministic merge in configuration order, with array concatenation
//! - Per-key callbacks, including a removal signal
//! - Content fingerprints so touched-but-unchanged files are ignored
//! - Debounced filesystem watching
//! - A pull-style stream of reload events
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use cfg_reloader::ConfigReloader;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> cfg_reloader::Result<()> {
//! let reloader = ConfigReloader::new(
//!     ["/etc/app/base.json", "/etc/app/local.json"],
//!     Duration::from_millis(500),
//! );
//!
//! reloader
//!     .subscribe("listen", |change| match change.extract::<String>() {
//!         Ok(Some(addr)) => println!("listen address is now {addr}"),
//!         Ok(None) => println!("listen address removed"),
//!         Err(e) => eprintln!("{e}"),
//!     })
//!     .await;
//!
//! reloader.start(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

/// Reloader settings and their TOML loading.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Hot reload engine: merging, diffing, watching and event dispatch.
pub mod reloader;

/// Logging setup for binaries embedding the reloader.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use crate::core::{ReloadError, Result};
pub use config::ReloaderConfig;
pub use reloader::{ConfigReloader, EventReceiver, KeyChange, ReloadEvent, ReloadOutcome};
