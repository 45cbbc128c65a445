//! cfg-reloader - watch a set of JSON config files and print key changes.
//!
//! Useful for checking how a set of files merges and which keys a given
//! edit actually touches before wiring the reloader into a service.

use std::{error::Error, path::PathBuf, process, time::Duration};

use cfg_reloader::{ConfigReloader, KeyChange, ReloaderConfig, tracing_config};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, span};

/// Watch JSON configuration files and report changed top-level keys.
#[derive(Debug, Parser)]
#[command(name = "cfg-reloader", version)]
struct Args {
    /// TOML settings file (files, batch_interval_ms, event_idle_interval_ms)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debounce window in milliseconds, overrides the settings file
    #[arg(short, long)]
    batch_ms: Option<u64>,

    /// Top-level key to report; may be repeated
    #[arg(short, long = "key")]
    keys: Vec<String>,

    /// JSON files to merge, lowest precedence first; appended to the settings file's list
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_config::init()?;
    let _span = span!(Level::INFO, "cfg_reloader_main").entered();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    Ok(())
}

/// Builds the reloader from arguments and runs until Ctrl-C.
///
/// # Errors
/// Returns error if the settings file cannot be loaded, the first reload
/// fails, or the file watcher cannot be started.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ReloaderConfig::load(path)?,
        None => ReloaderConfig::default(),
    };
    config.files.extend(args.files);
    if let Some(batch_ms) = args.batch_ms {
        config.batch_interval = Duration::from_millis(batch_ms);
    }

    if config.files.is_empty() {
        return Err("no configuration files given".into());
    }

    let reloader = ConfigReloader::from_config(config);
    for key in args.keys {
        reloader.subscribe(key, print_change).await;
    }

    let events = reloader.events();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("[{}] reloaded: {}", event.time.to_rfc3339(), event.reason);
        }
    });

    let cancel = CancellationToken::new();
    reloader.start(cancel.clone()).await?;
    info!("Watching {} file(s), press Ctrl+C to stop", reloader.files().len());

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    reloader.stop();

    Ok(())
}

fn print_change(change: &KeyChange) {
    match change.raw.as_deref() {
        Some(raw) => println!("{} = {raw}", change.key),
        None => println!("{} removed", change.key),
    }
}
