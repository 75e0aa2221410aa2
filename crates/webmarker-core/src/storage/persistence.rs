//! Page-keyed scene persistence.

use super::{Storage, StorageError, StorageResult};
use crate::scene::{Scene, Snapshot};
use std::sync::Arc;

/// Prefix of every stored annotation key; the page address follows it.
pub const PAGE_KEY_PREFIX: &str = "webMarker_canvas_";

/// Stores one scene snapshot per page address.
pub struct ScenePersistence<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for ScenePersistence<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> ScenePersistence<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Storage key for a page address.
    pub fn page_key(page: &str) -> String {
        format!("{PAGE_KEY_PREFIX}{page}")
    }

    /// Upsert the snapshot for `page`.
    pub async fn save(&self, page: &str, snapshot: &Snapshot) -> StorageResult<()> {
        self.storage
            .save(&Self::page_key(page), snapshot.as_str())
            .await?;
        log::info!("Annotation saved for: {}", page);
        Ok(())
    }

    /// Serialize `scene` and store it for `page`.
    pub async fn save_scene(&self, page: &str, scene: &Scene) -> StorageResult<Snapshot> {
        let snapshot = scene
            .snapshot()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.save(page, &snapshot).await?;
        Ok(snapshot)
    }

    pub async fn load(&self, page: &str) -> StorageResult<Option<Snapshot>> {
        let value = self.storage.load(&Self::page_key(page)).await?;
        Ok(value.map(Snapshot::new))
    }

    pub async fn delete(&self, page: &str) -> StorageResult<()> {
        self.storage.delete(&Self::page_key(page)).await
    }

    /// Page addresses with a stored annotation, sorted.
    pub async fn list_pages(&self) -> StorageResult<Vec<String>> {
        let mut pages: Vec<String> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(PAGE_KEY_PREFIX).map(str::to_string))
            .collect();
        pages.sort();
        Ok(pages)
    }

    /// Load the stored annotation for `page` into `scene`.
    ///
    /// Any failure is logged and leaves the scene as it was. Returns the
    /// snapshot that was applied.
    pub async fn restore(&self, page: &str, scene: &mut Scene) -> Option<Snapshot> {
        let snapshot = match self.load(page).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Error loading annotation for {}: {}", page, e);
                return None;
            }
        };
        match scene.restore(&snapshot) {
            Ok(()) => {
                let uploaded = scene.refresh_upload_indicators();
                log::info!(
                    "Annotation loaded for: {} ({} objects, {} uploaded)",
                    page,
                    scene.len(),
                    uploaded
                );
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("Error loading annotation for {}: {}", page, e);
                None
            }
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}
