//! Periodic auto-save of the open annotation.

use super::{ScenePersistence, Storage, StorageResult};
use crate::scene::Scene;
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Fixed-interval save timer.
///
/// Runs independently of the saves triggered by history; whichever write
/// lands last wins.
#[derive(Debug, Clone)]
pub struct AutoSaveManager {
    interval: Duration,
    /// Start of the current interval.
    last_tick: Instant,
    saves: u64,
}

impl AutoSaveManager {
    /// Start the timer at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_tick: now,
            saves: 0,
        }
    }

    /// Get the auto-save interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of auto-saves performed.
    pub fn saves(&self) -> u64 {
        self.saves
    }

    /// Whether a full interval has elapsed since the last tick.
    pub fn should_save(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_tick) >= self.interval
    }

    /// Save `scene` for `page` if the interval has elapsed.
    ///
    /// Returns true if a save was performed.
    pub async fn tick<S: Storage>(
        &mut self,
        now: Instant,
        persistence: &ScenePersistence<S>,
        page: &str,
        scene: &Scene,
    ) -> StorageResult<bool> {
        if !self.should_save(now) {
            return Ok(false);
        }
        // Restart the interval even if the write fails, so errors don't spin
        self.last_tick = now;
        persistence.save_scene(page, scene).await?;
        self.saves += 1;
        log::debug!("Auto-saved annotation for {}", page);
        Ok(true)
    }
}
