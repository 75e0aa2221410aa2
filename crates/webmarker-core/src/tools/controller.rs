//! Active tool state machine.

use super::{InteractionPolicy, ToolMode};
use crate::scene::{HoverCursor, Scene, SceneObject};
use crate::shapes::{
    BrushKind, Freehand, HIGHLIGHTER_OPACITY, Line, SerializableColor, Shape, ShapeId, ShapeStyle,
    Text,
};
use crate::storage::Preferences;
use kurbo::{Point, Vec2};

/// Thickness used when the slider reports nothing usable.
const FALLBACK_THICKNESS: f64 = 5.0;

/// Pick tolerance for Move mode hit testing.
const HIT_TOLERANCE: f64 = 4.0;

/// Per-session copies of the preference values. Edits never reach storage.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingValues {
    pub pen_thickness: f64,
    pub highlight_thickness: f64,
    pub erase_thickness: f64,
    pub text_size: f64,
    pub color: SerializableColor,
}

impl From<&Preferences> for WorkingValues {
    fn from(prefs: &Preferences) -> Self {
        Self {
            pen_thickness: prefs.pen_thickness,
            highlight_thickness: prefs.highlight_thickness,
            erase_thickness: prefs.erase_thickness,
            text_size: prefs.text_size,
            color: SerializableColor::from_hex(&prefs.pen_color).unwrap_or_default(),
        }
    }
}

/// In-flight interaction.
#[derive(Debug, Clone, Default)]
enum ToolState {
    #[default]
    Idle,
    /// Freehand stroke being painted; joins the scene on pointer-up.
    Stroke(Freehand),
    /// Line already in the scene whose end follows the pointer.
    DrawingLine(ShapeId),
    /// Text object with edit focus.
    EditingText(ShapeId),
    /// Object being dragged in Move mode.
    Dragging { id: ShapeId, last: Point, moved: bool },
}

/// What the caller must do after the controller handled an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutcome {
    /// A mutation was committed; take a history snapshot.
    pub commit: bool,
    /// The active tool changed.
    pub tool_changed: Option<ToolMode>,
    /// A text object just received edit focus.
    pub text_editing: Option<ShapeId>,
}

impl ToolOutcome {
    fn committed() -> Self {
        Self {
            commit: true,
            ..Self::default()
        }
    }
}

/// Owns the active [`ToolMode`] and maps pointer input to scene changes.
#[derive(Debug, Clone)]
pub struct ToolController {
    mode: ToolMode,
    state: ToolState,
    working: WorkingValues,
    /// Current thickness slider value.
    thickness: f64,
}

impl ToolController {
    /// Start in Pen mode with working values copied from `prefs`.
    pub fn new(prefs: &Preferences) -> Self {
        let working = WorkingValues::from(prefs);
        Self {
            mode: ToolMode::Pen,
            state: ToolState::Idle,
            thickness: working.pen_thickness,
            working,
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn policy(&self) -> InteractionPolicy {
        self.mode.policy()
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn color(&self) -> SerializableColor {
        self.working.color
    }

    pub fn working(&self) -> &WorkingValues {
        &self.working
    }

    pub fn is_editing_text(&self) -> bool {
        matches!(self.state, ToolState::EditingText(_))
    }

    pub fn editing_text(&self) -> Option<ShapeId> {
        match self.state {
            ToolState::EditingText(id) => Some(id),
            _ => None,
        }
    }

    /// Whether a line is currently being dragged out.
    pub fn is_drawing_line(&self) -> bool {
        matches!(self.state, ToolState::DrawingLine(_))
    }

    /// Style of the active freehand brush.
    pub fn brush_style(&self) -> ShapeStyle {
        let color = match self.mode {
            ToolMode::Highlighter => self.working.color.with_opacity(HIGHLIGHTER_OPACITY),
            _ => self.working.color,
        };
        ShapeStyle::stroked(color, self.thickness)
    }

    fn brush_kind(&self) -> BrushKind {
        match self.mode {
            ToolMode::Highlighter => BrushKind::Highlighter,
            ToolMode::Eraser => BrushKind::Eraser,
            _ => BrushKind::Pen,
        }
    }

    /// Switch tools.
    ///
    /// Clears the selection and any in-flight interaction, then reconfigures
    /// object selectability and the thickness slider for `mode`.
    pub fn select_tool(&mut self, scene: &mut Scene, mode: ToolMode) -> ToolOutcome {
        scene.discard_selection();
        self.reset_transient(scene);
        self.mode = mode;

        match mode {
            ToolMode::Move => scene.set_all_selectable(true, HoverCursor::Move),
            ToolMode::Line => scene.set_all_selectable(false, HoverCursor::Normal),
            _ => {}
        }

        match mode {
            ToolMode::Pen | ToolMode::Line => self.thickness = self.working.pen_thickness,
            ToolMode::Highlighter => self.thickness = self.working.highlight_thickness,
            ToolMode::Eraser => self.thickness = self.working.erase_thickness,
            ToolMode::Text => self.thickness = self.working.text_size,
            ToolMode::Pointer | ToolMode::Move => {}
        }

        log::debug!("Tool selected: {}", mode.name());
        ToolOutcome {
            tool_changed: Some(mode),
            ..ToolOutcome::default()
        }
    }

    fn reset_transient(&mut self, scene: &mut Scene) {
        if let ToolState::EditingText(id) = std::mem::take(&mut self.state) {
            discard_if_blank(scene, id);
        }
    }

    /// Move the thickness slider. Writes the working value of the active tool family.
    pub fn set_thickness(&mut self, value: f64) {
        let value = if value.is_finite() && value >= 1.0 {
            value.trunc()
        } else {
            FALLBACK_THICKNESS
        };
        match self.mode {
            ToolMode::Eraser => self.working.erase_thickness = value,
            ToolMode::Highlighter => self.working.highlight_thickness = value,
            ToolMode::Text => self.working.text_size = value,
            _ => self.working.pen_thickness = value,
        }
        self.thickness = value;
    }

    /// Change the brush color. The highlighter applies its opacity on top.
    pub fn set_color(&mut self, color: SerializableColor) {
        self.working.color = color;
    }

    pub fn pointer_down(&mut self, scene: &mut Scene, point: Point) -> ToolOutcome {
        match self.mode {
            ToolMode::Pointer => ToolOutcome::default(),
            ToolMode::Text => {
                if self.is_editing_text() {
                    // Clicking away ends the edit
                    return self.text_edit_exited(scene);
                }
                let font_size = 2.0 * self.thickness;
                let text = Text::new(
                    Point::new(point.x, point.y - font_size / 2.0),
                    String::new(),
                    font_size,
                    self.working.color,
                );
                let id = scene.add(Shape::Text(text));
                scene.select(id);
                self.state = ToolState::EditingText(id);
                ToolOutcome {
                    text_editing: Some(id),
                    ..ToolOutcome::default()
                }
            }
            ToolMode::Line => {
                let style = ShapeStyle::stroked(self.working.color, self.thickness);
                let mut object = SceneObject::new(Shape::Line(Line::anchored(point, style)));
                object.selectable = false;
                object.hover_cursor = HoverCursor::Normal;
                let id = scene.add_object(object);
                self.state = ToolState::DrawingLine(id);
                ToolOutcome::default()
            }
            ToolMode::Move => {
                match scene.objects_at_point(point, HIT_TOLERANCE).first() {
                    Some(&id) => {
                        scene.select(id);
                        self.state = ToolState::Dragging {
                            id,
                            last: point,
                            moved: false,
                        };
                    }
                    None => scene.discard_selection(),
                }
                ToolOutcome::default()
            }
            ToolMode::Pen | ToolMode::Highlighter | ToolMode::Eraser => {
                let mut stroke = Freehand::new(self.brush_kind(), self.brush_style());
                stroke.add_point(point);
                self.state = ToolState::Stroke(stroke);
                ToolOutcome::default()
            }
        }
    }

    /// Track the pointer. Never commits.
    pub fn pointer_move(&mut self, scene: &mut Scene, point: Point) -> ToolOutcome {
        match &mut self.state {
            ToolState::Stroke(stroke) => {
                if stroke.points.last() != Some(&point) {
                    stroke.add_point(point);
                }
            }
            ToolState::DrawingLine(id) => {
                if let Some(line) = scene.get_mut(*id).and_then(|o| o.shape.as_line_mut()) {
                    line.end = point;
                }
            }
            ToolState::Dragging { id, last, moved } => {
                let delta: Vec2 = point - *last;
                if delta != Vec2::ZERO && scene.move_object(*id, delta) {
                    *moved = true;
                }
                *last = point;
            }
            ToolState::Idle | ToolState::EditingText(_) => {}
        }
        ToolOutcome::default()
    }

    /// Finish the current interaction.
    ///
    /// Every tool except Move and Text commits here; a Move drag commits as an
    /// object modification.
    pub fn pointer_up(&mut self, scene: &mut Scene, point: Point) -> ToolOutcome {
        match self.mode {
            ToolMode::Text => ToolOutcome::default(),
            // Events pass through to the page, but the release still snapshots
            ToolMode::Pointer => ToolOutcome::committed(),
            ToolMode::Move => match std::mem::take(&mut self.state) {
                ToolState::Dragging { id, last, moved } => {
                    let delta = point - last;
                    let moved = (delta != Vec2::ZERO && scene.move_object(id, delta)) || moved;
                    if moved {
                        ToolOutcome::committed()
                    } else {
                        ToolOutcome::default()
                    }
                }
                _ => ToolOutcome::default(),
            },
            ToolMode::Line => {
                if let ToolState::DrawingLine(id) = std::mem::take(&mut self.state) {
                    if let Some(line) = scene.get_mut(id).and_then(|o| o.shape.as_line_mut()) {
                        line.end = point;
                    }
                }
                ToolOutcome::committed()
            }
            ToolMode::Pen | ToolMode::Highlighter | ToolMode::Eraser => {
                if let ToolState::Stroke(mut stroke) = std::mem::take(&mut self.state) {
                    if stroke.points.last() != Some(&point) {
                        stroke.add_point(point);
                    }
                    if !stroke.is_empty() {
                        scene.add(Shape::Freehand(stroke));
                    }
                }
                ToolOutcome::committed()
            }
        }
    }

    /// Replace the content of the text being edited.
    pub fn set_text_content(&mut self, scene: &mut Scene, content: &str) -> bool {
        let Some(id) = self.editing_text() else {
            return false;
        };
        match scene.get_mut(id).and_then(|o| o.shape.as_text_mut()) {
            Some(text) => {
                text.set_content(content.to_string());
                true
            }
            None => false,
        }
    }

    /// Text edit focus was lost: leave Text mode for Move.
    ///
    /// Empty text is discarded. Kept text is committed.
    pub fn text_edit_exited(&mut self, scene: &mut Scene) -> ToolOutcome {
        let kept = match std::mem::take(&mut self.state) {
            ToolState::EditingText(id) => !discard_if_blank(scene, id),
            _ => false,
        };
        let mut outcome = self.select_tool(scene, ToolMode::Move);
        outcome.commit = kept;
        outcome
    }

    /// Scene contents were replaced from history.
    pub fn history_restored(&mut self, scene: &mut Scene, redo: bool) {
        // Ids held by the in-flight interaction may no longer exist
        self.state = ToolState::Idle;
        if redo && self.mode == ToolMode::Line {
            scene.set_all_selectable(false, HoverCursor::Normal);
        }
    }
}

/// Remove a text object with no visible content. Returns whether it was removed.
fn discard_if_blank(scene: &mut Scene, id: ShapeId) -> bool {
    let blank = scene
        .get(id)
        .and_then(|o| o.shape.as_text())
        .is_some_and(Text::is_blank);
    if blank {
        scene.remove(id);
    }
    blank
}
