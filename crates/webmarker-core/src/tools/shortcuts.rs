//! Keyboard shortcut registry and resolution.

use super::{ToolController, ToolMode};
use crate::input::{InputState, Key, KeyEvent};

/// What a key press asks the overlay to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
    SelectTool(ToolMode),
    Clear,
    DeleteSelection,
    Exit,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub shift: bool,
    pub action: ShortcutAction,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        shift: bool,
        action: ShortcutAction,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            shift,
            action,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Shift+Z").
    pub fn format(&self) -> String {
        if self.shift {
            format!("Shift+{}", self.key)
        } else {
            self.key.to_string()
        }
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        use ShortcutAction::*;
        vec![
            Shortcut::new("Z", true, Undo, "Undo"),
            Shortcut::new("R", true, Redo, "Redo"),
            Shortcut::new("D", true, SelectTool(ToolMode::Pen), "Pen"),
            Shortcut::new("H", true, SelectTool(ToolMode::Highlighter), "Highlighter"),
            Shortcut::new("M", true, SelectTool(ToolMode::Move), "Move"),
            Shortcut::new("T", true, SelectTool(ToolMode::Text), "Text"),
            Shortcut::new("P", true, SelectTool(ToolMode::Pointer), "Pointer"),
            Shortcut::new("L", true, SelectTool(ToolMode::Line), "Line"),
            Shortcut::new("E", true, SelectTool(ToolMode::Eraser), "Eraser"),
            Shortcut::new("X", true, Clear, "Clear the drawing"),
            Shortcut::new("Backspace", false, DeleteSelection, "Delete selected objects"),
            Shortcut::new("Delete", false, DeleteSelection, "Delete selected objects"),
            Shortcut::new("Escape", false, Exit, "Save and close"),
        ]
    }

    /// Action bound to Shift + `c`, if any.
    fn shifted(c: char) -> Option<ShortcutAction> {
        let key = c.to_ascii_uppercase().to_string();
        Self::all()
            .into_iter()
            .find(|s| s.shift && s.key == key)
            .map(|s| s.action)
    }
}

/// Map a key press to an action given the current tool and pointer state.
///
/// Escape always exits. Delete and Backspace act outside Text mode and text
/// editing. Letter shortcuts need Shift and fire only while no text is being
/// edited, the Text tool is inactive and no pointer button is held; Clear is
/// ignored in Pointer mode.
pub fn resolve_shortcut(
    event: &KeyEvent,
    tools: &ToolController,
    input: &InputState,
) -> Option<ShortcutAction> {
    let text_busy = tools.is_editing_text() || tools.mode() == ToolMode::Text;
    match &event.key {
        Key::Escape => Some(ShortcutAction::Exit),
        Key::Backspace | Key::Delete if !text_busy => Some(ShortcutAction::DeleteSelection),
        Key::Character(c) => {
            if !event.modifiers.shift || text_busy || input.any_button_pressed() {
                return None;
            }
            match ShortcutRegistry::shifted(*c)? {
                ShortcutAction::Clear if tools.mode() == ToolMode::Pointer => None,
                action => Some(action),
            }
        }
        _ => None,
    }
}
