//! Hot reload engine for configuration merged from several JSON files.
//!
//! A reload pass fingerprints every configured file, merges their content
//! in configuration order, and notifies key subscribers whose value changed.
//! A background watch loop turns filesystem activity into debounced passes,
//! and an event dispatcher publishes a notice for each pass that changed
//! something.

mod changes;
mod coordinator;
mod diff;
mod dispatcher;
mod file_watching;
mod fingerprint;
mod merging;
mod service;

#[cfg(test)]
mod tests;

pub use changes::KeyChange;
pub use coordinator::ReloadOutcome;
pub use diff::KeyCallback;
pub use dispatcher::{EventReceiver, ReloadEvent};
pub use service::ConfigReloader;
