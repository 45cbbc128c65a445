//! Unit tests for reloader settings
//!
//! Covers defaults, TOML parsing and relative path resolution.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{fs, path::PathBuf, time::Duration};

use tempfile::TempDir;

use crate::{
    ReloadError,
    config::{DEFAULT_BATCH_INTERVAL, DEFAULT_EVENT_IDLE_INTERVAL, ReloaderConfig},
};

#[test]
fn config_default() {
    let config = ReloaderConfig::default();

    assert!(config.files.is_empty());
    assert_eq!(config.batch_interval, DEFAULT_BATCH_INTERVAL);
    assert_eq!(config.event_idle_interval, DEFAULT_EVENT_IDLE_INTERVAL);
}

#[test]
fn config_deserialize_toml() {
    let toml_str = r#"
        files = ["base.json", "/etc/app/local.json"]
        batch_interval_ms = 250
        event_idle_interval_ms = 50
    "#;

    let config = ReloaderConfig::from_toml(toml_str).unwrap();

    assert_eq!(
        config.files,
        vec![
            PathBuf::from("base.json"),
            PathBuf::from("/etc/app/local.json")
        ]
    );
    assert_eq!(config.batch_interval, Duration::from_millis(250));
    assert_eq!(config.event_idle_interval, Duration::from_millis(50));
}

#[test]
fn config_missing_fields_use_defaults() {
    let config = ReloaderConfig::from_toml(r#"files = ["a.json"]"#).unwrap();

    assert_eq!(config.batch_interval, DEFAULT_BATCH_INTERVAL);
    assert_eq!(config.event_idle_interval, DEFAULT_EVENT_IDLE_INTERVAL);
}

#[test]
fn config_serialize_toml_uses_millis() {
    let config =
        ReloaderConfig::new(["a.json"]).with_batch_interval(Duration::from_millis(1500));

    let toml_str = toml::to_string(&config).unwrap();

    assert!(toml_str.contains("batch_interval_ms = 1500"));
    assert_eq!(ReloaderConfig::from_toml(&toml_str).unwrap(), config);
}

#[test]
fn config_rejects_wrong_types() {
    let err = ReloaderConfig::from_toml(r#"batch_interval_ms = "soon""#).unwrap_err();

    assert!(matches!(err, ReloadError::ConfigLoadError { .. }));
}

#[test]
fn load_resolves_relative_files_against_settings_dir() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("reloader.toml");
    fs::write(&settings, r#"files = ["conf.d/base.json", "/abs/local.json"]"#).unwrap();

    let config = ReloaderConfig::load(&settings).unwrap();

    assert_eq!(
        config.files,
        vec![
            dir.path().join("conf.d/base.json"),
            PathBuf::from("/abs/local.json")
        ]
    );
}

#[test]
fn load_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    let err = ReloaderConfig::load(&dir.path().join("absent.toml")).unwrap_err();

    match err {
        ReloadError::ConfigLoadError { path, .. } => {
            assert_eq!(path, dir.path().join("absent.toml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
