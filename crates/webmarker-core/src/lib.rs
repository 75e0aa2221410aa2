//! Web Marker core library
//!
//! Annotation scene model, drawing tools, undo history, page-keyed
//! persistence, SVG export and the remote media upload protocol. Hosts mount an
//! [`Overlay`] per page and feed it input events.

pub mod export;
pub mod history;
pub mod input;
pub mod overlay;
pub mod scene;
pub mod shapes;
pub mod storage;
pub mod tools;
pub mod upload;
pub mod viewport;

pub use history::HistoryManager;
pub use input::{InputState, Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use overlay::{
    DownloadedDrawing, Overlay, OverlayConfig, OverlayError, OverlayEvent, SaveOption, SaveOutcome,
};
pub use scene::{Scene, SceneObject, Snapshot, UploadRecord};
pub use storage::{FileStorage, MemoryStorage, ScenePersistence, Storage, StorageError};
pub use tools::{ToolController, ToolMode};
pub use upload::{UploadConfig, UploadError, UploadMode, UploadSynchronizer, UreqTransport};
pub use viewport::{PageGeometry, ViewportError, ViewportMonitor};
