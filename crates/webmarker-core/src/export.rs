//! SVG export of scenes and single objects, plus the local-download helpers.

use crate::scene::{Scene, SceneObject};
use crate::shapes::{Shape, ShapeStyle};
use chrono::{DateTime, Local, TimeZone};
use kurbo::{BezPath, PathEl};
use std::fmt::Write as _;

const ERASE_MASK_ID: &str = "webmarker-erase";

/// Render a whole scene as a standalone SVG document sized to the surface.
pub fn scene_to_svg(scene: &Scene) -> String {
    render_document(scene.objects().iter(), scene.width(), scene.height())
}

/// Render a single object on its own padded surface.
///
/// The object is moved so its visual bounds start `padding` pixels from the
/// top-left corner; each side of the bounds is at least `min_size`.
pub fn object_to_svg(object: &SceneObject, padding: f64, min_size: f64) -> String {
    let (copy, size) = object.isolated(padding, min_size);
    render_document(std::iter::once(&copy), size.width, size.height)
}

fn render_document<'a>(
    objects: impl Iterator<Item = &'a SceneObject>,
    width: f64,
    height: f64,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no" ?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" width="{w}" height="{h}" viewBox="0 0 {w} {h}" xml:space="preserve">
<desc>Created with Web Marker</desc>
"#,
        w = num(width),
        h = num(height),
    );

    let mut layers = EraseLayers::new(width, height);
    for object in objects {
        if object.shape.is_eraser() {
            layers.erase(&object.shape);
        } else {
            layers.draw(&object.shape);
        }
    }
    layers.finish(&mut out);
    out.push_str("</svg>");
    out
}

/// Body of an exported document. Each run of eraser strokes masks only the
/// content drawn before it.
struct EraseLayers {
    width: f64,
    height: f64,
    defs: String,
    body: String,
    pending: Vec<Shape>,
    masks: usize,
}

impl EraseLayers {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            defs: String::new(),
            body: String::new(),
            pending: Vec::new(),
            masks: 0,
        }
    }

    fn erase(&mut self, shape: &Shape) {
        let mut eraser = shape.clone();
        eraser.style_mut().stroke_color = crate::shapes::SerializableColor::black();
        self.pending.push(eraser);
    }

    fn draw(&mut self, shape: &Shape) {
        self.flush_erasers();
        self.body.push_str(&shape_element(shape));
        self.body.push('\n');
    }

    fn flush_erasers(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let erasers = std::mem::take(&mut self.pending);
        // Nothing underneath to erase
        if self.body.is_empty() {
            return;
        }
        let id = format!("{ERASE_MASK_ID}-{}", self.masks);
        self.masks += 1;
        let _ = write!(
            self.defs,
            r#"<mask id="{id}" maskUnits="userSpaceOnUse" x="0" y="0" width="{w}" height="{h}"><rect x="0" y="0" width="{w}" height="{h}" fill="white"/>"#,
            w = num(self.width),
            h = num(self.height),
        );
        for eraser in &erasers {
            self.defs.push_str(&shape_element(eraser));
        }
        self.defs.push_str("</mask>");
        self.body = format!("<g mask=\"url(#{id})\">\n{}</g>\n", self.body);
    }

    fn finish(mut self, out: &mut String) {
        self.flush_erasers();
        if !self.defs.is_empty() {
            let _ = writeln!(out, "<defs>{}</defs>", self.defs);
        }
        out.push_str(&self.body);
    }
}

/// SVG element for one shape.
fn shape_element(shape: &Shape) -> String {
    match shape {
        Shape::Freehand(freehand) => format!(
            r#"<path d="{}" fill="none" {} stroke-linecap="round" stroke-linejoin="round"/>"#,
            path_data(&shape.to_path()),
            stroke_attrs(&freehand.style),
        ),
        Shape::Line(line) => format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {} stroke-linecap="butt"/>"#,
            num(line.start.x),
            num(line.start.y),
            num(line.end.x),
            num(line.end.y),
            stroke_attrs(&line.style),
        ),
        Shape::Text(text) => {
            let fill = text.style.fill_color.unwrap_or(text.style.stroke_color);
            let mut element = format!(
                r#"<text xml:space="preserve" font-family="{}" font-size="{}" fill="{}" fill-opacity="{}">"#,
                escape(&text.font_family),
                num(text.font_size),
                fill.to_css_rgb(),
                num(fill.opacity()),
            );
            let line_height = text.font_size * crate::shapes::Text::LINE_HEIGHT;
            for (i, line) in text.lines().iter().enumerate() {
                // Baseline sits one font size below the top of each line box
                let y = text.position.y + line_height * i as f64 + text.font_size;
                let _ = write!(
                    element,
                    r#"<tspan x="{}" y="{}">{}</tspan>"#,
                    num(text.position.x),
                    num(y),
                    escape(line),
                );
            }
            element.push_str("</text>");
            element
        }
        Shape::Image(image) => format!(
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
            num(image.position.x),
            num(image.position.y),
            num(image.width),
            num(image.height),
            image.data_uri(),
        ),
    }
}

fn stroke_attrs(style: &ShapeStyle) -> String {
    format!(
        r#"stroke="{}" stroke-opacity="{}" stroke-width="{}""#,
        style.stroke_color.to_css_rgb(),
        num(style.stroke_color.opacity()),
        num(style.stroke_width),
    )
}

/// SVG path data with compact coordinates.
fn path_data(path: &BezPath) -> String {
    let mut out = String::new();
    for element in path.elements() {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = match *element {
            PathEl::MoveTo(p) => write!(out, "M{} {}", num(p.x), num(p.y)),
            PathEl::LineTo(p) => write!(out, "L{} {}", num(p.x), num(p.y)),
            PathEl::QuadTo(a, p) => {
                write!(out, "Q{} {} {} {}", num(a.x), num(a.y), num(p.x), num(p.y))
            }
            PathEl::CurveTo(a, b, p) => write!(
                out,
                "C{} {} {} {} {} {}",
                num(a.x),
                num(a.y),
                num(b.x),
                num(b.y),
                num(p.x),
                num(p.y)
            ),
            PathEl::ClosePath => write!(out, "Z"),
        };
    }
    out
}

/// Compact decimal formatting for SVG attributes.
fn num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

/// Escape text for XML content and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// File name for a locally downloaded drawing, e.g. `WebMarker_Drawing_2024-03-09_1405.svg`.
pub fn drawing_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("WebMarker_Drawing_{}.svg", at.format("%Y-%m-%d_%H%M"))
}

/// File name for one uploaded object, e.g. `WebMarker_Path_3_2024-03-09T140512.svg`.
pub fn path_filename<Tz: TimeZone>(index: usize, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("WebMarker_Path_{}_{}.svg", index + 1, at.format("%Y-%m-%dT%H%M%S"))
}

/// Standalone HTML page previewing an exported drawing.
pub fn preview_html(svg: &str, page_url: &str, created: &DateTime<Local>) -> String {
    let url = escape(page_url);
    let body = svg.trim_start_matches(|c| c != '<').trim_start();
    // Drop the XML prolog so the SVG can be inlined
    let body = match body.strip_prefix("<?xml") {
        Some(rest) => rest.split_once("?>").map(|(_, svg)| svg.trim_start()).unwrap_or(rest),
        None => body,
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Web Marker Drawing</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }}
    .container {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}
    svg {{ border: 1px solid #ddd; border-radius: 4px; background: white; max-width: 100%; height: auto; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>Web Marker Drawing</h1>
    <p>Created: {created}</p>
    <p>Original URL: <a href="{url}" target="_blank">{url}</a></p>
    {body}
  </div>
</body>
</html>
"#,
        created = created.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BrushKind, Freehand, Line, SerializableColor, Text};
    use chrono::Utc;
    use kurbo::Point;

    #[test]
    fn test_scene_svg_has_surface_size() {
        let scene = Scene::new(1200.0, 7500.0);
        let svg = scene_to_svg(&scene);
        assert!(svg.contains(r#"width="1200" height="7500""#));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_shapes_render() {
        let mut scene = Scene::new(100.0, 100.0);
        scene.add(Shape::Line(Line::new(Point::new(1.0, 2.0), Point::new(3.5, 4.0))));
        scene.add(Shape::Freehand(Freehand::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
        ])));
        let svg = scene_to_svg(&scene);
        assert!(svg.contains(r#"<line x1="1" y1="2" x2="3.5" y2="4""#));
        assert!(svg.contains("<path d=\"M0 0 L10 10\""));
        assert!(svg.contains(r#"stroke="rgb(255,0,0)""#));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut scene = Scene::new(100.0, 100.0);
        scene.add(Shape::Text(Text::new(
            Point::new(0.0, 0.0),
            "a < b & c".to_string(),
            20.0,
            SerializableColor::black(),
        )));
        let svg = scene_to_svg(&scene);
        assert!(svg.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_eraser_becomes_mask() {
        let mut scene = Scene::new(100.0, 100.0);
        scene.add(Shape::Freehand(Freehand::from_points(vec![Point::ZERO, Point::new(5.0, 5.0)])));
        let mut eraser = Freehand::new(BrushKind::Eraser, ShapeStyle::default());
        eraser.add_point(Point::new(2.0, 2.0));
        scene.add(Shape::Freehand(eraser));

        let svg = scene_to_svg(&scene);
        assert!(svg.contains("<mask id=\"webmarker-erase-0\""));
        assert!(svg.contains("<g mask=\"url(#webmarker-erase-0)\">\n<path d=\"M0 0 L5 5\""));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn test_eraser_leaves_later_strokes_alone() {
        let mut scene = Scene::new(200.0, 100.0);
        let mut eraser = Freehand::new(BrushKind::Eraser, ShapeStyle::default());
        eraser.add_point(Point::new(0.0, 50.0));
        eraser.add_point(Point::new(200.0, 50.0));
        scene.add(Shape::Freehand(eraser));
        scene.add(Shape::Freehand(Freehand::from_points(vec![
            Point::new(0.0, 50.0),
            Point::new(200.0, 50.0),
        ])));

        let svg = scene_to_svg(&scene);
        assert!(!svg.contains("<mask"));
        assert!(!svg.contains("mask=\"url("));
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn test_each_eraser_masks_only_earlier_content() {
        let mut scene = Scene::new(100.0, 100.0);
        let stroke = |y: f64| {
            Shape::Freehand(Freehand::from_points(vec![Point::new(0.0, y), Point::new(50.0, y)]))
        };
        let eraser = |y: f64| {
            let mut eraser = Freehand::new(BrushKind::Eraser, ShapeStyle::default());
            eraser.add_point(Point::new(10.0, y));
            Shape::Freehand(eraser)
        };
        scene.add(stroke(10.0));
        scene.add(eraser(10.0));
        scene.add(stroke(20.0));
        scene.add(eraser(20.0));
        scene.add(stroke(30.0));

        let svg = scene_to_svg(&scene);
        let outer = svg.find("<g mask=\"url(#webmarker-erase-1)\">").unwrap();
        let inner = svg.find("<g mask=\"url(#webmarker-erase-0)\">").unwrap();
        let first = svg.find("M0 10 L50 10").unwrap();
        let second = svg.find("<path d=\"M0 20 L50 20").unwrap();
        let last = svg.find("<path d=\"M0 30 L50 30").unwrap();
        assert!(outer < inner && inner < first && first < second);
        // The last stroke sits after both masked groups have closed
        assert!(svg[..last].ends_with("</g>\n"));
        assert_eq!(svg[..last].matches("</g>").count(), 2);
        assert!(!svg[last..].contains("</g>"));
    }

    #[test]
    fn test_eraser_object_renders_blank() {
        let mut eraser = Freehand::new(BrushKind::Eraser, ShapeStyle::default());
        eraser.add_point(Point::new(10.0, 10.0));
        let svg = object_to_svg(&SceneObject::new(Shape::Freehand(eraser)), 10.0, 10.0);
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<mask"));
    }

    #[test]
    fn test_object_svg_is_padded() {
        let object = SceneObject::new(Shape::Line(Line::new(
            Point::new(500.0, 500.0),
            Point::new(600.0, 500.0),
        )));
        let svg = object_to_svg(&object, 10.0, 10.0);
        // 100 + 5 stroke wide, 10 minimum high, 10 px padding on each side
        assert!(svg.contains(r#"width="125" height="30""#));
        assert!(svg.contains(r#"x1="12.5""#));
    }

    #[test]
    fn test_filenames() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 12).unwrap();
        assert_eq!(drawing_filename(&at), "WebMarker_Drawing_2024-03-09_1405.svg");
        assert_eq!(path_filename(2, &at), "WebMarker_Path_3_2024-03-09T140512.svg");
    }

    #[test]
    fn test_preview_inlines_svg() {
        let svg = scene_to_svg(&Scene::new(10.0, 10.0));
        let html = preview_html(&svg, "https://example.com/?a=1&b=2", &Local::now());
        assert!(html.contains("<svg"));
        assert!(!html.contains("<?xml"));
        assert!(html.contains("https://example.com/?a=1&amp;b=2"));
    }
}
