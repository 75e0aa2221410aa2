//! Tool modes and the controller that turns input into scene mutations.

mod controller;
mod shortcuts;

pub use controller::{ToolController, ToolOutcome, WorkingValues};
pub use shortcuts::{Shortcut, ShortcutAction, ShortcutRegistry, resolve_shortcut};

use serde::{Deserialize, Serialize};

/// Available tools. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolMode {
    #[default]
    Pen,
    Highlighter,
    Eraser,
    /// Lets pointer events fall through to the page underneath.
    Pointer,
    Text,
    Move,
    Line,
}

impl ToolMode {
    pub const ALL: [ToolMode; 7] = [
        ToolMode::Pen,
        ToolMode::Highlighter,
        ToolMode::Eraser,
        ToolMode::Pointer,
        ToolMode::Text,
        ToolMode::Move,
        ToolMode::Line,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolMode::Pen => "Pen",
            ToolMode::Highlighter => "Highlighter",
            ToolMode::Eraser => "Eraser",
            ToolMode::Pointer => "Pointer",
            ToolMode::Text => "Text",
            ToolMode::Move => "Move",
            ToolMode::Line => "Line",
        }
    }

    /// Freehand brush tools.
    pub fn is_drawing(&self) -> bool {
        matches!(self, ToolMode::Pen | ToolMode::Highlighter | ToolMode::Eraser)
    }

    /// How the surface should behave while this tool is active.
    pub fn policy(&self) -> InteractionPolicy {
        InteractionPolicy {
            drawing: self.is_drawing(),
            selection: !matches!(self, ToolMode::Line),
            pointer_passthrough: matches!(self, ToolMode::Pointer),
            cursor: Cursor::Crosshair,
        }
    }
}

/// Surface cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Crosshair,
}

/// Surface configuration derived from the active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionPolicy {
    /// Pointer drags paint freehand strokes.
    pub drawing: bool,
    /// Marquee selection is allowed.
    pub selection: bool,
    /// Pointer events go to the page instead of the surface.
    pub pointer_passthrough: bool,
    pub cursor: Cursor,
}
