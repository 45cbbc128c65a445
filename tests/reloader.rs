//! Integration tests for the config reloader against the real filesystem
//! notification backend.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use cfg_reloader::{ConfigReloader, KeyChange, ReloadError, ReloadEvent};
use tempfile::TempDir;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

const BATCH: Duration = Duration::from_millis(200);
const SETTLE: Duration = Duration::from_millis(800);
const DEADLINE: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct Recorder {
    changes: Arc<Mutex<Vec<KeyChange>>>,
}

impl Recorder {
    fn callback(&self) -> impl Fn(&KeyChange) + Send + Sync + 'static {
        let changes = Arc::clone(&self.changes);
        move |change: &KeyChange| changes.lock().unwrap().push(change.clone())
    }

    fn take(&self) -> Vec<KeyChange> {
        std::mem::take(&mut *self.changes.lock().unwrap())
    }

    fn len(&self) -> usize {
        self.changes.lock().unwrap().len()
    }

    /// Waits until at least `count` changes arrived, then lets the batch
    /// window pass once more so stray extra calls would show up too.
    async fn wait_for(&self, count: usize) -> Vec<KeyChange> {
        let started = Instant::now();
        while self.len() < count && started.elapsed() < DEADLINE {
            sleep(Duration::from_millis(25)).await;
        }
        sleep(BATCH * 2).await;
        self.take()
    }
}

fn setup_test_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write_config(dir: &TempDir, name: &str, content: &str) {
    fs::write(dir.path().join(name), content).unwrap();
}

fn config_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn change(key: &str, raw: Option<&str>) -> KeyChange {
    KeyChange::new(key, raw.map(str::to_string))
}

async fn reloader_with_keys(
    dir: &TempDir,
    files: &[&str],
    keys: &[&str],
) -> (ConfigReloader, Recorder) {
    let reloader = ConfigReloader::new(files.iter().map(|name| config_path(dir, name)), BATCH);
    let recorder = Recorder::default();

    for key in keys {
        reloader.subscribe(*key, recorder.callback()).await;
    }

    (reloader, recorder)
}

async fn drain_events(events: &cfg_reloader::EventReceiver) -> Vec<ReloadEvent> {
    let mut drained = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), events.recv()).await {
        drained.push(event);
    }
    drained
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn follows_files_through_create_delete_and_rename() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1, "z": [3, 4]}"#);
        let (reloader, recorder) =
            reloader_with_keys(&dir, &["cfg1.json", "cfg2.json"], &["x", "z"]).await;

        reloader.start(CancellationToken::new()).await.unwrap();
        assert_eq!(
            recorder.take(),
            vec![change("x", Some("1")), change("z", Some("[3,4]"))]
        );

        write_config(&dir, "cfg2.json", r#"{"x": 2, "z": [5, 6]}"#);
        assert_eq!(
            recorder.wait_for(2).await,
            vec![change("x", Some("2")), change("z", Some("[3,4,5,6]"))]
        );

        fs::remove_file(config_path(&dir, "cfg2.json")).unwrap();
        assert_eq!(
            recorder.wait_for(2).await,
            vec![change("x", Some("1")), change("z", Some("[3,4]"))]
        );

        fs::rename(
            config_path(&dir, "cfg1.json"),
            config_path(&dir, "thrash.json"),
        )
        .unwrap();
        assert_eq!(
            recorder.wait_for(2).await,
            vec![change("x", None), change("z", None)]
        );

        reloader.stop();
    }

    #[tokio::test]
    async fn force_reload_picks_up_changes_and_updates_reload_time() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;

        reloader.start(CancellationToken::new()).await.unwrap();
        let started_at = reloader.reload_time().await.unwrap();
        recorder.take();
        reloader.stop();

        write_config(&dir, "cfg1.json", r#"{"x": 7}"#);
        let outcome = reloader.force_reload("manual").await.unwrap();

        assert!(outcome.is_reloaded());
        assert_eq!(recorder.take(), vec![change("x", Some("7"))]);
        assert!(reloader.reload_time().await.unwrap() >= started_at);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, _recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;

        reloader.start(CancellationToken::new()).await.unwrap();
        let err = reloader.start(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ReloadError::AlreadyStarted));
        reloader.stop();
    }

    #[tokio::test]
    async fn failed_start_can_be_retried() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": "#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;

        let err = reloader.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReloadError::JsonParseError { .. }));
        assert!(reloader.reload_time().await.is_none());

        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        reloader.start(CancellationToken::new()).await.unwrap();

        assert_eq!(recorder.take(), vec![change("x", Some("1"))]);
        reloader.stop();
    }

    #[tokio::test]
    async fn empty_string_is_an_ordinary_key() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"": "blank", "x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &[""]).await;

        let outcome = reloader.force_reload("manual").await.unwrap();

        assert!(outcome.is_reloaded());
        assert_eq!(recorder.take(), vec![change("", Some(r#""blank""#))]);
    }

    #[tokio::test]
    async fn edit_during_first_pass_is_picked_up() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;

        let path = config_path(&dir, "cfg1.json");
        let edited = Arc::new(AtomicBool::new(false));
        reloader
            .subscribe("x", move |_| {
                if !edited.swap(true, Ordering::SeqCst) {
                    fs::write(&path, r#"{"x": 2}"#).unwrap();
                }
            })
            .await;

        reloader.start(CancellationToken::new()).await.unwrap();

        assert_eq!(
            recorder.wait_for(2).await,
            vec![change("x", Some("1")), change("x", Some("2"))]
        );
        reloader.stop();
    }
}

mod watching {
    use super::*;

    #[tokio::test]
    async fn unrelated_files_in_the_directory_are_ignored() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        reloader.start(CancellationToken::new()).await.unwrap();
        recorder.take();

        write_config(&dir, "ignored.json", r#"{"x": 3}"#);
        sleep(SETTLE).await;

        assert!(recorder.take().is_empty());
        reloader.stop();
    }

    #[tokio::test]
    async fn rewriting_identical_content_notifies_nobody() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1, "thrash": 2222}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        reloader.start(CancellationToken::new()).await.unwrap();
        recorder.take();

        write_config(&dir, "cfg1.json", r#"{"x": 1, "thrash": 2222}"#);
        sleep(SETTLE).await;

        assert!(recorder.take().is_empty());
        reloader.stop();
    }

    #[tokio::test]
    async fn burst_of_writes_is_one_reload() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        let events = reloader.events();
        reloader.start(CancellationToken::new()).await.unwrap();
        recorder.take();
        drain_events(&events).await;

        for x in [3, 4, 5, 2] {
            write_config(&dir, "cfg1.json", &format!(r#"{{"x": {x}}}"#));
        }

        assert_eq!(recorder.wait_for(1).await, vec![change("x", Some("2"))]);
        let reloads = drain_events(&events).await;
        assert_eq!(reloads.len(), 1);
        assert!(reloads[0].reason.contains("cfg1.json"));
        reloader.stop();
    }

    #[tokio::test]
    async fn burst_ending_at_starting_content_notifies_nobody() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 2}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        reloader.start(CancellationToken::new()).await.unwrap();
        recorder.take();

        for x in [1, 3, 4, 2] {
            write_config(&dir, "cfg1.json", &format!(r#"{{"x": {x}}}"#));
        }
        sleep(SETTLE).await;

        assert!(recorder.take().is_empty());
        reloader.stop();
    }

    #[tokio::test]
    async fn invalid_edit_keeps_last_good_values() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        reloader.start(CancellationToken::new()).await.unwrap();
        recorder.take();

        write_config(&dir, "cfg1.json", "{ not json");
        sleep(SETTLE).await;
        assert!(recorder.take().is_empty());

        write_config(&dir, "cfg1.json", r#"{"x": 5}"#);
        assert_eq!(recorder.wait_for(1).await, vec![change("x", Some("5"))]);
        reloader.stop();
    }

    #[tokio::test]
    async fn cancellation_stops_watching() {
        let dir = setup_test_dir();
        write_config(&dir, "cfg1.json", r#"{"x": 1}"#);
        let (reloader, recorder) = reloader_with_keys(&dir, &["cfg1.json"], &["x"]).await;
        let events = reloader.events();
        let cancel = CancellationToken::new();
        reloader.start(cancel.clone()).await.unwrap();
        recorder.take();

        cancel.cancel();
        sleep(BATCH).await;
        write_config(&dir, "cfg1.json", r#"{"x": 9}"#);
        sleep(SETTLE).await;

        assert!(recorder.take().is_empty());
        let closed = timeout(DEADLINE, async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
