//! User preferences: default pen color and per-tool thickness.

use super::{Storage, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage key of the preferences record.
pub const PREFERENCES_KEY: &str = "webMarker_preferences";

/// Persisted preferences. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Hex color, e.g. `#FF0000`.
    pub pen_color: String,
    pub pen_thickness: f64,
    pub highlight_thickness: f64,
    pub erase_thickness: f64,
    pub text_size: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            pen_color: "#FF0000".to_string(),
            pen_thickness: 5.0,
            highlight_thickness: 22.0,
            erase_thickness: 30.0,
            text_size: 20.0,
        }
    }
}

/// Reads and writes [`Preferences`] under [`PREFERENCES_KEY`].
pub struct PreferenceStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> PreferenceStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Load preferences, falling back to defaults when absent or unreadable.
    pub async fn load(&self) -> Preferences {
        match self.storage.load(PREFERENCES_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(prefs) => prefs,
                Err(e) => {
                    log::warn!("Ignoring unreadable preferences: {}", e);
                    Preferences::default()
                }
            },
            Ok(None) => Preferences::default(),
            Err(e) => {
                log::warn!("Failed to load preferences: {}", e);
                Preferences::default()
            }
        }
    }

    pub async fn save(&self, prefs: &Preferences) -> StorageResult<()> {
        let json =
            serde_json::to_string(prefs).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.save(PREFERENCES_KEY, &json).await
    }
}
