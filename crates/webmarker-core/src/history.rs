//! Undo/redo over serialized scene snapshots.

use crate::scene::{Scene, Snapshot};

/// Snapshot stacks for one overlay session.
///
/// The first recorded mutation becomes the floor: it is the current state with
/// nothing beneath it, so undo can never return to an empty scene that was
/// never recorded.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    current: Option<Snapshot>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a restored snapshot as the current state without creating undo entries.
    pub fn seed(&mut self, snapshot: Snapshot) {
        self.current = Some(snapshot);
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Snapshot the scene after a committed mutation.
    ///
    /// Returns the new snapshot so the caller can forward it to storage.
    pub fn record_mutation(&mut self, scene: &Scene) -> Result<Snapshot, serde_json::Error> {
        let snapshot = scene.snapshot()?;
        if let Some(prior) = self.current.replace(snapshot.clone()) {
            self.undo_stack.push(prior);
        }
        self.redo_stack.clear();
        log::debug!(
            "History recorded (undo: {}, redo: 0)",
            self.undo_stack.len()
        );
        Ok(snapshot)
    }

    /// Step back one snapshot. Returns false when there is nothing to undo.
    pub fn undo(&mut self, scene: &mut Scene) -> Result<bool, serde_json::Error> {
        let Some(previous) = self.undo_stack.last() else {
            return Ok(false);
        };
        // Restore first so a bad snapshot leaves the stacks untouched
        scene.restore(previous)?;
        let previous = self.undo_stack.pop();
        if let Some(current) = std::mem::replace(&mut self.current, previous) {
            self.redo_stack.push(current);
        }
        Ok(true)
    }

    /// Step forward one snapshot. Returns false when there is nothing to redo.
    pub fn redo(&mut self, scene: &mut Scene) -> Result<bool, serde_json::Error> {
        let Some(next) = self.redo_stack.last() else {
            return Ok(false);
        };
        scene.restore(next)?;
        let next = self.redo_stack.pop();
        if let Some(current) = std::mem::replace(&mut self.current, next) {
            self.undo_stack.push(current);
        }
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// The most recently recorded or restored snapshot.
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}
