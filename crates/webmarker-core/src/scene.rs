//! Annotation scene and per-object state.
//!
//! The scene is a flat, ordered list of [`SceneObject`]s (back to front). It is
//! the only owner of drawable state; history and persistence hold serialized
//! [`Snapshot`]s of it, never live references.

use crate::shapes::{Shape, ShapeId};
use chrono::{DateTime, Utc};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Serialized scene state. Equal strings mean identical rendered state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Marks an object that has been published to the remote media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub uploaded: bool,
    pub media_id: String,
    /// Absent when the media was registered but not placed on a page.
    #[serde(default)]
    pub item_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(media_id: String, item_id: Option<String>) -> Self {
        Self {
            uploaded: true,
            media_id,
            item_id,
            uploaded_at: Utc::now(),
        }
    }

    /// Both remote identifiers are known, so the object never needs re-uploading.
    pub fn is_complete(&self) -> bool {
        self.uploaded && !self.media_id.is_empty() && self.item_id.is_some()
    }
}

/// Cursor shown when hovering an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverCursor {
    #[default]
    Normal,
    Move,
}

/// One drawable object plus its interaction flags and upload metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub shape: Shape,
    #[serde(default = "default_selectable")]
    pub selectable: bool,
    #[serde(default)]
    pub hover_cursor: HoverCursor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadRecord>,
    /// Decorative "already published" marker. Derived from `upload`, never stored.
    #[serde(skip)]
    pub upload_indicator: bool,
}

fn default_selectable() -> bool {
    true
}

impl SceneObject {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            selectable: true,
            hover_cursor: HoverCursor::default(),
            upload: None,
            upload_indicator: false,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.shape.id()
    }

    pub fn is_uploaded(&self) -> bool {
        self.upload.as_ref().is_some_and(UploadRecord::is_complete)
    }

    /// Attach an upload record and show the indicator.
    pub fn mark_uploaded(&mut self, record: UploadRecord) {
        self.upload = Some(record);
        self.upload_indicator = true;
    }

    /// Structural copy moved so its visual bounds start at `(offset, offset)`.
    ///
    /// Returns the copy together with the size of the surface it needs: the
    /// bounds (at least `min_size` on each side) plus `offset` on every edge.
    pub fn isolated(&self, offset: f64, min_size: f64) -> (SceneObject, Size) {
        let bounds = self.shape.visual_bounds();
        let mut copy = self.clone();
        copy.shape
            .transform(Affine::translate(Vec2::new(offset - bounds.x0, offset - bounds.y0)));
        let size = Size::new(
            bounds.width().max(min_size) + offset * 2.0,
            bounds.height().max(min_size) + offset * 2.0,
        );
        (copy, size)
    }
}

/// The annotation surface contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    version: u32,
    /// Objects back to front.
    objects: Vec<SceneObject>,
    /// Surface size in page pixels.
    #[serde(skip)]
    size: Size,
    /// Currently selected (active) objects.
    #[serde(skip)]
    selection: Vec<ShapeId>,
}

impl Scene {
    /// Create an empty scene with a surface of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            objects: Vec::new(),
            size: Size::new(width, height),
            selection: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn set_width(&mut self, width: f64) {
        self.size.width = width;
    }

    pub fn set_height(&mut self, height: f64) {
        self.size.height = height;
    }

    /// Add a shape on top of the scene.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        self.add_object(SceneObject::new(shape))
    }

    pub fn add_object(&mut self, object: SceneObject) -> ShapeId {
        let id = object.id();
        self.objects.push(object);
        id
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ShapeId) -> Option<SceneObject> {
        self.selection.retain(|&sel| sel != id);
        let index = self.index_of(id)?;
        Some(self.objects.remove(index))
    }

    /// Remove every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.selection.clear();
    }

    pub fn get(&self, id: ShapeId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    /// Objects back to front.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Make `id` the only active object.
    pub fn select(&mut self, id: ShapeId) {
        self.selection.clear();
        if self.get(id).is_some() {
            self.selection.push(id);
        }
    }

    pub fn add_to_selection(&mut self, id: ShapeId) {
        if self.get(id).is_some() && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    /// Deselect everything.
    pub fn discard_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &[ShapeId] {
        &self.selection
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(&id)
    }

    /// Remove all selected objects. Returns how many were removed.
    pub fn remove_selected(&mut self) -> usize {
        let selected: Vec<ShapeId> = self.selection.drain(..).collect();
        let before = self.objects.len();
        self.objects.retain(|o| !selected.contains(&o.id()));
        before - self.objects.len()
    }

    /// Set selectability and hover cursor on every object.
    pub fn set_all_selectable(&mut self, selectable: bool, cursor: HoverCursor) {
        for object in &mut self.objects {
            object.selectable = selectable;
            object.hover_cursor = cursor;
        }
    }

    /// Selectable objects under a point, front to back.
    pub fn objects_at_point(&self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        self.objects
            .iter()
            .rev()
            .filter(|o| o.selectable && o.shape.hit_test(point, tolerance))
            .map(SceneObject::id)
            .collect()
    }

    /// Translate an object by `delta`.
    pub fn move_object(&mut self, id: ShapeId, delta: Vec2) -> bool {
        match self.get_mut(id) {
            Some(object) => {
                object.shape.transform(Affine::translate(delta));
                true
            }
            None => false,
        }
    }

    /// Union of all object bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.objects
            .iter()
            .map(|o| o.shape.visual_bounds())
            .reduce(|acc, b| acc.union(b))
    }

    /// Re-derive decorative upload indicators from the stored records.
    pub fn refresh_upload_indicators(&mut self) -> usize {
        let mut count = 0;
        for object in &mut self.objects {
            object.upload_indicator = object.upload.as_ref().is_some_and(|r| r.uploaded);
            if object.upload_indicator {
                count += 1;
            }
        }
        count
    }

    /// Serialize the scene contents.
    pub fn snapshot(&self) -> Result<Snapshot, serde_json::Error> {
        serde_json::to_string(self).map(Snapshot)
    }

    /// Replace the scene contents with a snapshot.
    ///
    /// Surface size is kept. On error the scene is left untouched.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), serde_json::Error> {
        let restored: Scene = serde_json::from_str(snapshot.as_str())?;
        self.version = restored.version;
        self.objects = restored.objects;
        self.selection.clear();
        self.refresh_upload_indicators();
        Ok(())
    }
}
