use std::any;

use serde::de::DeserializeOwned;

use crate::{ReloadError, Result};

/// A change of one top-level configuration key, as delivered to callbacks.
///
/// `raw` holds the canonical JSON text of the key's new value, or `None`
/// when the key disappeared from the merged configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    /// Top-level key that changed.
    pub key: String,
    /// Canonical JSON of the new value, `None` on removal.
    pub raw: Option<String>,
}

impl KeyChange {
    /// Creates a new key change.
    ///
    /// # Arguments
    ///
    /// * `key` - The top-level key that changed
    /// * `raw` - Canonical JSON of the new value, or `None` if the key was removed
    pub fn new(key: impl Into<String>, raw: Option<String>) -> Self {
        Self {
            key: key.into(),
            raw,
        }
    }

    /// Returns `true` if the key is no longer present in any configured file.
    pub fn is_removed(&self) -> bool {
        self.raw.is_none()
    }

    /// Extracts the new value as a specific type.
    ///
    /// Returns `Ok(None)` when the key was removed, so subscribers can fall
    /// back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::TypeMismatch` if the value cannot be deserialized
    /// into the requested type.
    pub fn extract<T>(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(raw) = self.raw.as_deref() else {
            return Ok(None);
        };

        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| ReloadError::TypeMismatch {
                key: self.key.clone(),
                expected_type: any::type_name::<T>(),
                details: e.to_string(),
            })
    }
}
