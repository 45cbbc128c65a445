use std::{fmt, sync::Arc};

use serde_json::{Map, Value};
use tracing::debug;

use super::KeyChange;
use crate::{ReloadError, Result};

/// Callback invoked with the change of a subscribed key.
pub type KeyCallback = Arc<dyn Fn(&KeyChange) + Send + Sync>;

/// A callback registered on one top-level key.
///
/// `last_raw` is the value most recently delivered to this callback, so a
/// key that disappears and later comes back is compared against what the
/// subscriber actually saw.
pub(crate) struct KeySubscription {
    pub key: String,
    callback: KeyCallback,
    last_raw: Option<String>,
}

impl KeySubscription {
    pub fn new(key: String, callback: KeyCallback) -> Self {
        Self {
            key,
            callback,
            last_raw: None,
        }
    }
}

impl fmt::Debug for KeySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySubscription")
            .field("key", &self.key)
            .field("last_raw", &self.last_raw)
            .finish_non_exhaustive()
    }
}

/// Compares the merged configuration against what every subscriber last saw
/// and invokes callbacks for keys whose serialized value changed.
///
/// Subscriptions are evaluated in registration order. A key missing from the
/// merged tree is reported once with `raw: None` and then stays silent until
/// it reappears.
///
/// # Errors
/// Returns `ReloadError::SerializationError` if a merged value cannot be
/// serialized. Subscriptions evaluated before the failure keep their update.
///
/// # Returns
/// The distinct keys that produced at least one callback, in order.
pub(crate) fn dispatch_changes(
    subscriptions: &mut [KeySubscription],
    merged: &Map<String, Value>,
) -> Result<Vec<String>> {
    let mut changed_keys: Vec<String> = Vec::new();

    for subscription in subscriptions.iter_mut() {
        let current = merged
            .get(&subscription.key)
            .map(|value| canonical_json(&subscription.key, value))
            .transpose()?;

        if current == subscription.last_raw {
            continue;
        }

        debug!(
            key = %subscription.key,
            removed = current.is_none(),
            "Configuration key changed"
        );

        let change = KeyChange::new(subscription.key.clone(), current);
        (subscription.callback)(&change);
        subscription.last_raw = change.raw;

        if !changed_keys.contains(&subscription.key) {
            changed_keys.push(subscription.key.clone());
        }
    }

    Ok(changed_keys)
}

/// `serde_json` keeps object keys sorted, so equal trees serialize to equal bytes.
fn canonical_json(key: &str, value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ReloadError::SerializationError {
        key: key.to_string(),
        details: e.to_string(),
    })
}
