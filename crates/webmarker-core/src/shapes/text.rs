//! Text shape.

use super::{SerializableColor, ShapeId, ShapeStyle, ShapeTrait};
use kurbo::{Affine, BezPath, Point, Rect, Shape as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub(crate) id: ShapeId,
    /// Position (top-left corner of text bounding box).
    pub position: Point,
    /// The text content.
    pub content: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// CSS font family.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Style properties. Text is painted with the fill color.
    pub style: ShapeStyle,
}

fn default_font_family() -> String {
    Text::DEFAULT_FONT_FAMILY.to_string()
}

impl Text {
    pub const DEFAULT_FONT_FAMILY: &'static str = "arial";

    /// Average glyph advance as a fraction of the font size.
    const CHAR_WIDTH_FACTOR: f64 = 0.55;

    /// Create a new text shape filled with `color`.
    pub fn new(position: Point, content: String, font_size: f64, color: SerializableColor) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            content,
            font_size,
            font_family: default_font_family(),
            style: ShapeStyle::filled(color),
        }
    }

    /// Set the text content.
    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    /// Get the text content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the text has no visible characters.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Text lines as rendered (a trailing newline opens an empty line).
    pub fn lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.content.lines().collect();
        if lines.is_empty() || self.content.ends_with('\n') {
            lines.push("");
        }
        lines
    }

    /// Approximate width based on character count and font size.
    fn approximate_width(&self) -> f64 {
        let max_line_len = self
            .lines()
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        max_line_len as f64 * self.font_size * Self::CHAR_WIDTH_FACTOR
    }

    /// Approximate height based on font size and number of lines.
    fn approximate_height(&self) -> f64 {
        self.lines().len() as f64 * self.font_size * Self::LINE_HEIGHT
    }

    /// Line height as a multiple of the font size.
    pub const LINE_HEIGHT: f64 = 1.16;
}

impl ShapeTrait for Text {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        // Empty text still reserves a caret-wide box
        let width = self.approximate_width().max(2.0);
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + width,
            self.position.y + self.approximate_height(),
        )
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    fn to_path(&self) -> BezPath {
        self.bounds().to_path(0.1)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        self.position = affine * self.position;
        let coeffs = affine.as_coeffs();
        let scale = (coeffs[0].abs() + coeffs[3].abs()) / 2.0;
        if (scale - 1.0).abs() > 0.01 {
            self.font_size *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> Text {
        Text::new(
            Point::new(100.0, 100.0),
            content.to_string(),
            40.0,
            SerializableColor::red(),
        )
    }

    #[test]
    fn test_text_creation() {
        let t = text("Hello");
        assert_eq!(t.content(), "Hello");
        assert_eq!(t.font_family, "arial");
        assert_eq!(t.style.fill_color, Some(SerializableColor::red()));
    }

    #[test]
    fn test_hit_test() {
        let t = text("Hello World");
        let bounds = t.bounds();
        let center = Point::new((bounds.x0 + bounds.x1) / 2.0, (bounds.y0 + bounds.y1) / 2.0);
        assert!(t.hit_test(center, 0.0));
        assert!(!t.hit_test(Point::new(0.0, 0.0), 0.0));
    }

    #[test]
    fn test_multiline_bounds_grow() {
        let one = text("Hi").bounds();
        let two = text("Hi\nthere").bounds();
        assert!(two.height() > one.height());
        assert!(two.width() > one.width());
    }

    #[test]
    fn test_blank_detection() {
        assert!(text("").is_blank());
        assert!(text("  \n").is_blank());
        assert!(!text("x").is_blank());
    }
}
