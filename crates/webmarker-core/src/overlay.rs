//! One mounted annotation session on one page.
//!
//! [`Overlay`] owns the scene and wires the tool controller, history,
//! persistence, autosave, viewport monitor and uploader together. Hosts feed it
//! input and drain [`OverlayEvent`]s to update their UI. After [`Overlay::exit`]
//! every call is ignored.

use crate::export::{drawing_filename, preview_html, scene_to_svg};
use crate::history::HistoryManager;
use crate::input::{InputState, KeyEvent, MouseButton, PointerEvent};
use crate::scene::Scene;
use crate::shapes::{SerializableColor, ShapeId};
use crate::storage::{AutoSaveManager, PreferenceStore, ScenePersistence, Storage, StorageError};
use crate::tools::{ShortcutAction, ToolController, ToolMode, ToolOutcome, resolve_shortcut};
use crate::upload::{
    BatchReport, MediaTransport, UnitOutcome, UploadConfig, UploadError, UploadMode,
    UploadProgress, UploadSynchronizer,
};
use crate::viewport::{PageGeometry, UNSUPPORTED_HEIGHT_MESSAGE, ViewportError, ViewportMonitor};
use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Viewport(#[from] ViewportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("failed to snapshot the drawing: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("the overlay session is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Address of the annotated page; also the storage identity.
    pub page_url: String,
    pub geometry: PageGeometry,
    pub upload: UploadConfig,
}

impl OverlayConfig {
    pub fn new(page_url: impl Into<String>, geometry: PageGeometry) -> Self {
        Self {
            page_url: page_url.into(),
            geometry,
            upload: UploadConfig::default(),
        }
    }
}

/// Something the host UI should reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    ToolChanged(ToolMode),
    HistoryState { can_undo: bool, can_redo: bool },
    /// A text object took edit focus.
    TextEditing(ShapeId),
    SurfaceResized { width: f64, height: f64 },
    /// User-visible message.
    Notice(String),
    UploadProgress(UploadProgress),
    Closed,
}

/// Where a save goes.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOption {
    /// Local SVG file plus a preview page.
    Download,
    Upload {
        mode: UploadMode,
        rights_holder: Option<String>,
    },
}

/// A drawing ready to be written locally.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedDrawing {
    pub filename: String,
    pub svg: String,
    pub preview_html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Downloaded(DownloadedDrawing),
    UploadedSingle(UnitOutcome),
    UploadedObjects(BatchReport),
}

pub struct Overlay<S: Storage, T: MediaTransport> {
    page_url: String,
    scene: Scene,
    tools: ToolController,
    input: InputState,
    history: HistoryManager,
    viewport: ViewportMonitor,
    persistence: ScenePersistence<S>,
    autosave: AutoSaveManager,
    uploader: UploadSynchronizer<T>,
    events: Vec<OverlayEvent>,
    closed: bool,
}

impl<S: Storage, T: MediaTransport> Overlay<S, T> {
    /// Size the surface, load preferences and restore the page's annotation.
    ///
    /// Pages taller than the supported ceiling are refused before anything
    /// else happens.
    pub async fn mount(
        config: OverlayConfig,
        storage: Arc<S>,
        transport: Arc<T>,
        now: Instant,
    ) -> Result<Self, OverlayError> {
        let viewport = ViewportMonitor::initial(&config.geometry).inspect_err(|e| {
            log::warn!("Refusing to mount on {}: {}", config.page_url, e);
        })?;

        let prefs = PreferenceStore::new(Arc::clone(&storage)).load().await;
        let persistence = ScenePersistence::new(storage);

        let size = viewport.size();
        let mut scene = Scene::new(size.width, size.height);
        let mut history = HistoryManager::new();
        if let Some(snapshot) = persistence.restore(&config.page_url, &mut scene).await {
            history.seed(snapshot);
        }

        let mut overlay = Self {
            uploader: UploadSynchronizer::new(config.upload, transport)?,
            page_url: config.page_url,
            scene,
            tools: ToolController::new(&prefs),
            input: InputState::new(),
            history,
            viewport,
            persistence,
            autosave: AutoSaveManager::new(now),
            events: Vec::new(),
            closed: false,
        };
        overlay.events.push(OverlayEvent::ToolChanged(overlay.tools.mode()));
        overlay.push_history_state();
        log::info!("Overlay mounted on {}", overlay.page_url);
        Ok(overlay)
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn tools(&self) -> &ToolController {
        &self.tools
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn viewport(&self) -> &ViewportMonitor {
        &self.viewport
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Take the events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<OverlayEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_history_state(&mut self) {
        self.events.push(OverlayEvent::HistoryState {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    /// Persist the visible scene. Failures are reported, not fatal.
    async fn persist(&mut self) {
        if let Err(e) = self.persistence.save_scene(&self.page_url, &self.scene).await {
            log::error!("Saving annotation for {} failed: {}", self.page_url, e);
            self.events
                .push(OverlayEvent::Notice(format!("Saving the drawing failed: {e}")));
        }
    }

    /// Snapshot a committed mutation and forward it to storage.
    async fn commit(&mut self) -> Result<(), OverlayError> {
        let snapshot = self.history.record_mutation(&self.scene)?;
        if let Err(e) = self.persistence.save(&self.page_url, &snapshot).await {
            log::error!("Saving annotation for {} failed: {}", self.page_url, e);
            self.events
                .push(OverlayEvent::Notice(format!("Saving the drawing failed: {e}")));
        }
        self.push_history_state();
        Ok(())
    }

    async fn apply(&mut self, outcome: ToolOutcome) -> Result<(), OverlayError> {
        if let Some(mode) = outcome.tool_changed {
            self.events.push(OverlayEvent::ToolChanged(mode));
        }
        if let Some(id) = outcome.text_editing {
            self.events.push(OverlayEvent::TextEditing(id));
        }
        if outcome.commit {
            self.commit().await?;
        }
        Ok(())
    }

    pub fn select_tool(&mut self, mode: ToolMode) {
        if self.closed {
            return;
        }
        let outcome = self.tools.select_tool(&mut self.scene, mode);
        if let Some(mode) = outcome.tool_changed {
            self.events.push(OverlayEvent::ToolChanged(mode));
        }
    }

    pub fn set_thickness(&mut self, value: f64) {
        if !self.closed {
            self.tools.set_thickness(value);
        }
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        if !self.closed {
            self.tools.set_color(color);
        }
    }

    /// Route a pointer event to the active tool. Only the primary button draws.
    pub async fn handle_pointer(&mut self, event: PointerEvent) -> Result<(), OverlayError> {
        if self.closed {
            return Ok(());
        }
        self.input.handle_pointer_event(event);
        let outcome = match event {
            PointerEvent::Down {
                position,
                button: MouseButton::Left,
            } => self.tools.pointer_down(&mut self.scene, position),
            PointerEvent::Move { position } => self.tools.pointer_move(&mut self.scene, position),
            PointerEvent::Up {
                position,
                button: MouseButton::Left,
            } => self.tools.pointer_up(&mut self.scene, position),
            _ => ToolOutcome::default(),
        };
        self.apply(outcome).await
    }

    /// Handle a key press. Returns the shortcut it triggered, if any.
    pub async fn handle_key(
        &mut self,
        event: &KeyEvent,
    ) -> Result<Option<ShortcutAction>, OverlayError> {
        if self.closed {
            return Ok(None);
        }
        let Some(action) = resolve_shortcut(event, &self.tools, &self.input) else {
            return Ok(None);
        };
        log::debug!("Shortcut {:?}", action);
        self.run_action(action).await?;
        Ok(Some(action))
    }

    async fn run_action(&mut self, action: ShortcutAction) -> Result<(), OverlayError> {
        match action {
            ShortcutAction::Undo => self.undo().await,
            ShortcutAction::Redo => self.redo().await,
            ShortcutAction::SelectTool(mode) => {
                self.select_tool(mode);
                Ok(())
            }
            ShortcutAction::Clear => self.clear().await,
            ShortcutAction::DeleteSelection => self.delete_selection().await,
            ShortcutAction::Exit => {
                self.exit().await;
                Ok(())
            }
        }
    }

    pub async fn undo(&mut self) -> Result<(), OverlayError> {
        if self.closed || !self.history.undo(&mut self.scene)? {
            return Ok(());
        }
        self.tools.history_restored(&mut self.scene, false);
        self.persist().await;
        self.push_history_state();
        Ok(())
    }

    pub async fn redo(&mut self) -> Result<(), OverlayError> {
        if self.closed || !self.history.redo(&mut self.scene)? {
            return Ok(());
        }
        self.tools.history_restored(&mut self.scene, true);
        self.persist().await;
        self.push_history_state();
        Ok(())
    }

    /// Remove every object. Undoable.
    pub async fn clear(&mut self) -> Result<(), OverlayError> {
        if self.closed {
            return Ok(());
        }
        self.scene.clear();
        self.commit().await
    }

    pub async fn delete_selection(&mut self) -> Result<(), OverlayError> {
        if self.closed {
            return Ok(());
        }
        if self.scene.remove_selected() > 0 {
            self.commit().await?;
        }
        Ok(())
    }

    /// Replace the content of the text being edited.
    pub fn set_text_content(&mut self, content: &str) -> bool {
        !self.closed && self.tools.set_text_content(&mut self.scene, content)
    }

    /// The text editor lost focus.
    pub async fn text_edit_exited(&mut self) -> Result<(), OverlayError> {
        if self.closed {
            return Ok(());
        }
        let outcome = self.tools.text_edit_exited(&mut self.scene);
        self.apply(outcome).await
    }

    /// Re-measure after a scroll. A page that grew past the ceiling closes the session.
    pub async fn handle_scroll(&mut self, geometry: &PageGeometry) -> Result<(), OverlayError> {
        if self.closed {
            return Ok(());
        }
        match self.viewport.on_scroll(geometry) {
            Ok(change) => {
                if let Some(width) = change.width {
                    self.scene.set_width(width);
                }
                if let Some(height) = change.height {
                    self.scene.set_height(height);
                }
                if !change.is_empty() {
                    self.events.push(OverlayEvent::SurfaceResized {
                        width: self.viewport.width(),
                        height: self.viewport.height(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Closing overlay on {}: {}", self.page_url, e);
                self.events
                    .push(OverlayEvent::Notice(UNSUPPORTED_HEIGHT_MESSAGE.to_string()));
                self.exit().await;
                Err(e.into())
            }
        }
    }

    /// Timer tick; saves when the autosave interval has elapsed.
    pub async fn tick(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        if let Err(e) = self
            .autosave
            .tick(now, &self.persistence, &self.page_url, &self.scene)
            .await
        {
            log::error!("Auto-save for {} failed: {}", self.page_url, e);
        }
    }

    /// Export or publish the drawing.
    pub async fn save_drawing(&mut self, option: SaveOption) -> Result<SaveOutcome, OverlayError> {
        if self.closed {
            return Err(match option {
                SaveOption::Download => OverlayError::Closed,
                SaveOption::Upload { .. } => UploadError::SessionClosed.into(),
            });
        }
        let now = Local::now();
        match option {
            SaveOption::Download => {
                let svg = scene_to_svg(&self.scene);
                let preview_html = preview_html(&svg, &self.page_url, &now);
                log::info!("Exported drawing for {}", self.page_url);
                Ok(SaveOutcome::Downloaded(DownloadedDrawing {
                    filename: drawing_filename(&now),
                    svg,
                    preview_html,
                }))
            }
            SaveOption::Upload {
                mode: UploadMode::Single,
                rights_holder,
            } => {
                self.events.push(OverlayEvent::Notice(
                    "Uploading single SVG to Research Catalogue...".to_string(),
                ));
                let filename = drawing_filename(&now);
                match self
                    .uploader
                    .upload_single(&self.scene, &self.page_url, rights_holder.as_deref(), &filename)
                    .await
                {
                    Ok(outcome) => {
                        self.events.push(OverlayEvent::Notice(format!(
                            "Successfully uploaded single SVG! Media ID: {}",
                            outcome.media_id
                        )));
                        Ok(SaveOutcome::UploadedSingle(outcome))
                    }
                    Err(e) => {
                        self.events
                            .push(OverlayEvent::Notice(format!("Single SVG upload failed: {e}")));
                        Err(e.into())
                    }
                }
            }
            SaveOption::Upload {
                mode: UploadMode::Objects,
                rights_holder,
            } => {
                self.events.push(OverlayEvent::Notice(
                    "Uploading individual paths to Research Catalogue...".to_string(),
                ));
                let events = &mut self.events;
                let result = self
                    .uploader
                    .upload_objects(
                        &mut self.scene,
                        &self.page_url,
                        rights_holder.as_deref(),
                        |progress| events.push(OverlayEvent::UploadProgress(progress)),
                    )
                    .await;
                match result {
                    Ok(report) => {
                        // Uploaded or skipped objects; keep the records in history and storage
                        self.commit().await?;
                        self.events.push(OverlayEvent::Notice(report.summary()));
                        Ok(SaveOutcome::UploadedObjects(report))
                    }
                    Err(e) => {
                        self.events
                            .push(OverlayEvent::Notice(format!("Multi-path upload failed: {e}")));
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Save and close. Later calls on this overlay do nothing.
    pub async fn exit(&mut self) {
        if self.closed {
            return;
        }
        self.persist().await;
        self.closed = true;
        self.events.push(OverlayEvent::Closed);
        log::info!("Overlay closed on {}", self.page_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, Modifiers};
    use crate::scene::Snapshot;
    use crate::shapes::{Line, Shape};
    use crate::storage::{MemoryStorage, PREFERENCES_KEY};
    use crate::testing::block_on;
    use crate::upload::ScriptedTransport;
    use kurbo::Point;
    use std::time::Duration;

    const PAGE: &str = "https://www.researchcatalogue.net/view/1000/2000";

    type TestOverlay = Overlay<MemoryStorage, ScriptedTransport>;

    fn mount_with(storage: &Arc<MemoryStorage>, transport: &Arc<ScriptedTransport>) -> TestOverlay {
        let config = OverlayConfig::new(PAGE, PageGeometry::simple(1280.0, 3000.0, 800.0));
        block_on(Overlay::mount(
            config,
            Arc::clone(storage),
            Arc::clone(transport),
            Instant::now(),
        ))
        .unwrap()
    }

    fn mount() -> (TestOverlay, Arc<MemoryStorage>, Arc<ScriptedTransport>) {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        (mount_with(&storage, &transport), storage, transport)
    }

    fn stroke(overlay: &mut TestOverlay, from: Point, to: Point) {
        block_on(overlay.handle_pointer(PointerEvent::Down {
            position: from,
            button: MouseButton::Left,
        }))
        .unwrap();
        block_on(overlay.handle_pointer(PointerEvent::Move { position: to })).unwrap();
        block_on(overlay.handle_pointer(PointerEvent::Up {
            position: to,
            button: MouseButton::Left,
        }))
        .unwrap();
    }

    fn stored(storage: &MemoryStorage) -> Option<String> {
        block_on(storage.load(&ScenePersistence::<MemoryStorage>::page_key(PAGE))).unwrap()
    }

    #[test]
    fn test_mount_sizes_surface_and_reports_state() {
        let (mut overlay, _, _) = mount();
        assert_eq!(overlay.scene().height(), 7500.0);
        assert_eq!(overlay.scene().width(), 1280.0);
        assert_eq!(
            overlay.drain_events(),
            vec![
                OverlayEvent::ToolChanged(ToolMode::Pen),
                OverlayEvent::HistoryState {
                    can_undo: false,
                    can_redo: false
                }
            ]
        );
    }

    #[test]
    fn test_mount_refuses_tall_pages() {
        let config = OverlayConfig::new(PAGE, PageGeometry::simple(1280.0, 30000.0, 800.0));
        let result = block_on(TestOverlay::mount(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(ScriptedTransport::new()),
            Instant::now(),
        ));
        assert!(matches!(
            result,
            Err(OverlayError::Viewport(ViewportError::GeometryLimitExceeded { .. }))
        ));
    }

    #[test]
    fn test_mount_uses_stored_preferences() {
        let storage = Arc::new(MemoryStorage::new());
        block_on(storage.save(PREFERENCES_KEY, r#"{"penThickness": 9}"#)).unwrap();
        let overlay = mount_with(&storage, &Arc::new(ScriptedTransport::new()));
        assert_eq!(overlay.tools().thickness(), 9.0);
    }

    #[test]
    fn test_strokes_commit_and_persist() {
        let (mut overlay, storage, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));

        assert_eq!(overlay.scene().len(), 1);
        assert_eq!(
            stored(&storage).as_deref(),
            overlay.history().current().map(Snapshot::as_str)
        );
    }

    #[test]
    fn test_two_strokes_undo_redo() {
        let (mut overlay, storage, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        stroke(&mut overlay, Point::new(60.0, 10.0), Point::new(90.0, 50.0));
        assert_eq!(overlay.scene().len(), 2);

        block_on(overlay.undo()).unwrap();
        assert_eq!(overlay.scene().len(), 1);
        assert!(!overlay.history().can_undo());
        assert!(overlay.history().can_redo());

        // Undo floor: the first stroke stays
        block_on(overlay.undo()).unwrap();
        assert_eq!(overlay.scene().len(), 1);

        block_on(overlay.redo()).unwrap();
        assert_eq!(overlay.scene().len(), 2);
        assert!(!overlay.history().can_redo());

        let restored = overlay.scene().snapshot().unwrap();
        assert_eq!(stored(&storage).as_deref(), Some(restored.as_str()));
    }

    #[test]
    fn test_remount_restores_and_seeds_history() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        let mut first = mount_with(&storage, &transport);
        stroke(&mut first, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        block_on(first.exit());

        let mut second = mount_with(&storage, &transport);
        assert_eq!(second.scene().len(), 1);
        assert!(!second.history().can_undo());

        stroke(&mut second, Point::new(60.0, 10.0), Point::new(90.0, 50.0));
        block_on(second.undo()).unwrap();
        assert_eq!(second.scene().len(), 1);
    }

    #[test]
    fn test_corrupt_store_mounts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        block_on(storage.save(&ScenePersistence::<MemoryStorage>::page_key(PAGE), "{broken"))
            .unwrap();
        let overlay = mount_with(&storage, &Arc::new(ScriptedTransport::new()));
        assert!(overlay.scene().is_empty());
        assert!(overlay.history().current().is_none());
    }

    #[test]
    fn test_shortcuts_drive_tools_and_history() {
        let (mut overlay, _, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        stroke(&mut overlay, Point::new(60.0, 10.0), Point::new(90.0, 50.0));

        let action = block_on(overlay.handle_key(&KeyEvent::shift('z'))).unwrap();
        assert_eq!(action, Some(ShortcutAction::Undo));
        assert_eq!(overlay.scene().len(), 1);

        // Without Shift nothing happens
        let plain = KeyEvent::new(Key::Character('r'), Modifiers::default());
        assert_eq!(block_on(overlay.handle_key(&plain)).unwrap(), None);

        block_on(overlay.handle_key(&KeyEvent::shift('m'))).unwrap();
        assert_eq!(overlay.tools().mode(), ToolMode::Move);
        assert!(overlay.drain_events().contains(&OverlayEvent::ToolChanged(ToolMode::Move)));
    }

    #[test]
    fn test_clear_is_undoable() {
        let (mut overlay, _, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        block_on(overlay.handle_key(&KeyEvent::shift('x'))).unwrap();
        assert!(overlay.scene().is_empty());

        block_on(overlay.undo()).unwrap();
        assert_eq!(overlay.scene().len(), 1);
    }

    #[test]
    fn test_delete_selection_in_move_mode() {
        let (mut overlay, _, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        overlay.select_tool(ToolMode::Move);

        block_on(overlay.handle_pointer(PointerEvent::Down {
            position: Point::new(30.0, 30.0),
            button: MouseButton::Left,
        }))
        .unwrap();
        block_on(overlay.handle_pointer(PointerEvent::Up {
            position: Point::new(30.0, 30.0),
            button: MouseButton::Left,
        }))
        .unwrap();
        assert_eq!(overlay.scene().selection().len(), 1);

        block_on(overlay.handle_key(&KeyEvent::plain(Key::Delete))).unwrap();
        assert!(overlay.scene().is_empty());
        assert!(overlay.history().can_undo());
    }

    #[test]
    fn test_text_flow() {
        let (mut overlay, _, _) = mount();
        overlay.select_tool(ToolMode::Text);
        block_on(overlay.handle_pointer(PointerEvent::Down {
            position: Point::new(100.0, 100.0),
            button: MouseButton::Left,
        }))
        .unwrap();
        assert!(overlay.tools().is_editing_text());

        // Shortcuts are off while typing
        assert_eq!(block_on(overlay.handle_key(&KeyEvent::shift('x'))).unwrap(), None);

        assert!(overlay.set_text_content("hello"));
        block_on(overlay.text_edit_exited()).unwrap();
        assert_eq!(overlay.tools().mode(), ToolMode::Move);
        assert_eq!(overlay.scene().len(), 1);
        assert!(overlay.history().current().is_some());
    }

    #[test]
    fn test_right_button_does_not_draw() {
        let (mut overlay, _, _) = mount();
        block_on(overlay.handle_pointer(PointerEvent::Down {
            position: Point::new(10.0, 10.0),
            button: MouseButton::Right,
        }))
        .unwrap();
        block_on(overlay.handle_pointer(PointerEvent::Up {
            position: Point::new(20.0, 20.0),
            button: MouseButton::Right,
        }))
        .unwrap();
        assert!(overlay.scene().is_empty());
        assert!(overlay.history().current().is_none());
    }

    #[test]
    fn test_autosave_tick() {
        let storage = Arc::new(MemoryStorage::new());
        let start = Instant::now();
        let config = OverlayConfig::new(PAGE, PageGeometry::simple(1280.0, 3000.0, 800.0));
        let mut overlay = block_on(TestOverlay::mount(
            config,
            Arc::clone(&storage),
            Arc::new(ScriptedTransport::new()),
            start,
        ))
        .unwrap();

        block_on(overlay.tick(start + Duration::from_secs(5)));
        assert!(stored(&storage).is_none());
        block_on(overlay.tick(start + Duration::from_secs(30)));
        assert!(stored(&storage).is_some());
    }

    #[test]
    fn test_scroll_growth_and_ceiling() {
        let (mut overlay, storage, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        overlay.drain_events();

        let mut geometry = PageGeometry::simple(1280.0, 20000.0, 800.0);
        geometry.scroll_top = 7000.0;
        block_on(overlay.handle_scroll(&geometry)).unwrap();
        assert_eq!(overlay.scene().height(), 15000.0);
        assert_eq!(
            overlay.drain_events(),
            vec![OverlayEvent::SurfaceResized {
                width: 1280.0,
                height: 15000.0
            }]
        );

        geometry.doc_scroll_height = 40000.0;
        geometry.scroll_top = 14500.0;
        block_on(overlay.handle_scroll(&geometry)).unwrap();
        assert_eq!(overlay.scene().height(), 22500.0);

        geometry.scroll_top = 22000.0;
        assert!(block_on(overlay.handle_scroll(&geometry)).is_err());
        assert!(overlay.is_closed());
        assert!(stored(&storage).is_some());
        let events = overlay.drain_events();
        assert!(events.contains(&OverlayEvent::Notice(UNSUPPORTED_HEIGHT_MESSAGE.to_string())));
        assert_eq!(events.last(), Some(&OverlayEvent::Closed));
    }

    #[test]
    fn test_exit_saves_then_ignores_calls() {
        let (mut overlay, storage, _) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        block_on(storage.delete(&ScenePersistence::<MemoryStorage>::page_key(PAGE))).unwrap();

        block_on(overlay.handle_key(&KeyEvent::plain(Key::Escape))).unwrap();
        assert!(overlay.is_closed());
        assert!(stored(&storage).is_some());
        assert_eq!(overlay.drain_events().last(), Some(&OverlayEvent::Closed));

        stroke(&mut overlay, Point::new(60.0, 10.0), Point::new(90.0, 50.0));
        block_on(overlay.exit());
        assert_eq!(overlay.scene().len(), 1);
        assert!(overlay.drain_events().is_empty());
        assert!(matches!(
            block_on(overlay.save_drawing(SaveOption::Upload {
                mode: UploadMode::Objects,
                rights_holder: None
            })),
            Err(OverlayError::Upload(UploadError::SessionClosed))
        ));
    }

    #[test]
    fn test_download() {
        let (mut overlay, _, _) = mount();
        overlay.select_tool(ToolMode::Line);
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));

        let outcome = block_on(overlay.save_drawing(SaveOption::Download)).unwrap();
        let SaveOutcome::Downloaded(drawing) = outcome else {
            panic!("expected a download");
        };
        assert!(drawing.filename.starts_with("WebMarker_Drawing_"));
        assert!(drawing.filename.ends_with(".svg"));
        assert!(drawing.svg.contains("<svg"));
        assert!(drawing.preview_html.contains(PAGE));
    }

    #[test]
    fn test_object_upload_commits_records() {
        let (mut overlay, storage, transport) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        transport
            .respond(200, "parent.window.formAction = '/simple-media/edit?file=42';")
            .respond(200, "")
            .respond(200, r#"<div data-id="77"></div>"#);
        overlay.drain_events();

        let outcome = block_on(overlay.save_drawing(SaveOption::Upload {
            mode: UploadMode::Objects,
            rights_holder: None,
        }))
        .unwrap();
        assert!(matches!(outcome, SaveOutcome::UploadedObjects(ref r) if r.uploaded() == 1));
        assert!(overlay.scene().objects()[0].is_uploaded());
        assert!(overlay.history().can_undo());
        assert!(stored(&storage).unwrap().contains("\"media_id\":\"42\""));

        let events = overlay.drain_events();
        assert!(events.contains(&OverlayEvent::UploadProgress(UploadProgress {
            current: 1,
            total: 1
        })));
        assert!(events.contains(&OverlayEvent::Notice(
            "Successfully uploaded 1 paths".to_string()
        )));

        // Second run skips without touching the network and still snapshots
        let calls = transport.paths().len();
        let depth = overlay.history().undo_depth();
        let outcome = block_on(overlay.save_drawing(SaveOption::Upload {
            mode: UploadMode::Objects,
            rights_holder: None,
        }))
        .unwrap();
        assert!(matches!(outcome, SaveOutcome::UploadedObjects(ref r) if r.skipped() == 1));
        assert_eq!(transport.paths().len(), calls);
        assert_eq!(overlay.history().undo_depth(), depth + 1);
    }

    #[test]
    fn test_object_upload_partial_failure_commits() {
        let (mut overlay, storage, transport) = mount();
        stroke(&mut overlay, Point::new(10.0, 10.0), Point::new(50.0, 50.0));
        stroke(&mut overlay, Point::new(100.0, 10.0), Point::new(150.0, 50.0));
        stroke(&mut overlay, Point::new(200.0, 10.0), Point::new(250.0, 50.0));
        let registered = "parent.window.formAction = '/simple-media/edit?file=42';";
        let placed = r#"<div data-id="77"></div>"#;
        transport
            .respond(200, registered)
            .respond(200, "")
            .respond(200, placed)
            .respond(500, "")
            .respond(200, registered)
            .respond(200, "")
            .respond(200, placed);
        let depth = overlay.history().undo_depth();

        let outcome = block_on(overlay.save_drawing(SaveOption::Upload {
            mode: UploadMode::Objects,
            rights_holder: None,
        }))
        .unwrap();
        let SaveOutcome::UploadedObjects(report) = outcome else {
            panic!("expected a batch report");
        };
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 1);
        assert!(report.results[1].error().is_some());
        assert_eq!(overlay.history().undo_depth(), depth + 1);
        assert!(!overlay.scene().objects()[1].is_uploaded());

        let saved = stored(&storage).unwrap();
        assert_eq!(saved.matches("\"media_id\":\"42\"").count(), 2);
        assert!(overlay.drain_events().contains(&OverlayEvent::Notice(
            "Successfully uploaded 2 paths, 1 failed".to_string()
        )));
    }

    #[test]
    fn test_upload_failure_names_operation() {
        let (mut overlay, _, transport) = mount();
        overlay.scene.add(Shape::Line(Line::new(Point::ZERO, Point::new(5.0, 5.0))));
        transport.respond(200, "<html>login</html>");

        let result = block_on(overlay.save_drawing(SaveOption::Upload {
            mode: UploadMode::Single,
            rights_holder: None,
        }));
        assert!(matches!(result, Err(OverlayError::Upload(UploadError::Protocol(_)))));
        let events = overlay.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            OverlayEvent::Notice(text) if text.starts_with("Single SVG upload failed: media registration")
        )));
    }
}
