//! Unit tests for the reloader module.
//! File-backed cases use temporary directories; none rely on filesystem
//! notifications.

#![allow(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]


use std::sync::{Arc, Mutex};

use super::KeyChange;

/// Records every change delivered to the callbacks it hands out.
#[derive(Clone, Default)]
pub(super) struct Recorder {
    changes: Arc<Mutex<Vec<KeyChange>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl Fn(&KeyChange) + Send + Sync + 'static {
        let changes = Arc::clone(&self.changes);
        move |change: &KeyChange| changes.lock().unwrap().push(change.clone())
    }

    pub fn take(&self) -> Vec<KeyChange> {
        std::mem::take(&mut *self.changes.lock().unwrap())
    }
}

pub(super) fn change(key: &str, raw: Option<&str>) -> KeyChange {
    KeyChange::new(key, raw.map(str::to_string))
}
