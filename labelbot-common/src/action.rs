//! Edit actions exchanged between labeling sessions.
//!
//! An [`EditAction`] is the unit of change applied to the shared document.
//! Every action records the session that produced it and the items it
//! targets; the payload depends on the action kind.

use serde::{Deserialize, Serialize};

/// A single edit applied to the shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditAction {
    /// Session that produced the action.
    #[serde(default)]
    pub session_id: String,
    /// Kind-specific payload, tagged by `type`.
    #[serde(flatten)]
    pub payload: ActionPayload,
}

/// Kind-specific content of an edit action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Create labels, with their shapes, on one or more items.
    ///
    /// `labels[i]` and `shapes[i]` belong to `item_indices[i]`; `shapes[i][j]`
    /// is the shape list of `labels[i][j]`.
    AddLabels {
        item_indices: Vec<usize>,
        labels: Vec<Vec<Label>>,
        shapes: Vec<Vec<Vec<Shape>>>,
    },
    /// Replace the geometry of existing shapes.
    ChangeShapes {
        item_indices: Vec<usize>,
        shape_ids: Vec<Vec<String>>,
        shapes: Vec<Vec<Shape>>,
    },
    /// Remove labels (and the shapes they own) from items.
    DeleteLabels {
        item_indices: Vec<usize>,
        label_ids: Vec<Vec<String>>,
    },
    /// Any action kind this crate does not interpret.
    #[serde(other)]
    Other,
}

impl EditAction {
    pub fn new(session_id: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            session_id: session_id.into(),
            payload,
        }
    }

    /// Short name of the action kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self.payload {
            ActionPayload::AddLabels { .. } => "add_labels",
            ActionPayload::ChangeShapes { .. } => "change_shapes",
            ActionPayload::DeleteLabels { .. } => "delete_labels",
            ActionPayload::Other => "other",
        }
    }

    /// Items targeted by this action. Empty for uninterpreted kinds.
    pub fn item_indices(&self) -> &[usize] {
        match &self.payload {
            ActionPayload::AddLabels { item_indices, .. }
            | ActionPayload::ChangeShapes { item_indices, .. }
            | ActionPayload::DeleteLabels { item_indices, .. } => item_indices,
            ActionPayload::Other => &[],
        }
    }
}

/// Label kinds understood by the labeling tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Box2d,
    Polygon2d,
    Polyline2d,
    Tag,
    Plane3d,
    Box3d,
    Customized,
}

/// A label on an item. Geometry lives in the shapes it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    /// Index of the item the label belongs to. `None` until the label is
    /// attached to an item.
    #[serde(default)]
    pub item: Option<usize>,
    #[serde(rename = "label_type")]
    pub kind: LabelKind,
    #[serde(default)]
    pub category: Vec<u32>,
    /// Ids of the shapes owned by this label.
    #[serde(default)]
    pub shapes: Vec<String>,
    /// Whether a human drew the label.
    #[serde(default = "default_manual")]
    pub manual: bool,
}

fn default_manual() -> bool {
    true
}

impl Label {
    /// Create a label with a fresh id.
    pub fn new(kind: LabelKind, category: Vec<u32>, manual: bool) -> Self {
        Self {
            id: crate::new_id(),
            item: None,
            kind,
            category,
            shapes: Vec::new(),
            manual,
        }
    }
}

/// Geometry attached to a label, tagged by `shape_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape_type", rename_all = "snake_case")]
pub enum Shape {
    Rect(Rect),
    PathPoint2d(PathPoint2d),
    Node2d(Node2d),
}

impl Shape {
    pub fn id(&self) -> &str {
        match self {
            Shape::Rect(r) => &r.id,
            Shape::PathPoint2d(p) => &p.id,
            Shape::Node2d(n) => &n.id,
        }
    }

    /// Short name of the shape kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Rect(_) => "rect",
            Shape::PathPoint2d(_) => "path_point_2d",
            Shape::Node2d(_) => "node_2d",
        }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub id: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            id: crate::new_id(),
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// Whether a path point is a vertex or a bezier control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPointKind {
    Line,
    Bezier,
}

/// One point of a polygon or polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint2d {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub point_type: PathPointKind,
}

impl PathPoint2d {
    pub fn new(x: f64, y: f64, point_type: PathPointKind) -> Self {
        Self {
            id: crate::new_id(),
            x,
            y,
            point_type,
        }
    }
}

/// Named keypoint of a skeleton label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node2d {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

/// Build an action adding one box label to an item.
pub fn add_box2d_label(item_index: usize, category: Vec<u32>, rect: Rect) -> EditAction {
    add_single_label(item_index, LabelKind::Box2d, category, vec![Shape::Rect(rect)], true)
}

/// Build an action adding one polygon (or polyline) label to an item.
pub fn add_polygon2d_label(
    item_index: usize,
    category: Vec<u32>,
    points: Vec<PathPoint2d>,
    closed: bool,
    manual: bool,
) -> EditAction {
    let kind = if closed {
        LabelKind::Polygon2d
    } else {
        LabelKind::Polyline2d
    };
    let shapes = points.into_iter().map(Shape::PathPoint2d).collect();
    add_single_label(item_index, kind, category, shapes, manual)
}

fn add_single_label(
    item_index: usize,
    kind: LabelKind,
    category: Vec<u32>,
    shapes: Vec<Shape>,
    manual: bool,
) -> EditAction {
    let mut label = Label::new(kind, category, manual);
    label.item = Some(item_index);
    label.shapes = shapes.iter().map(|s| s.id().to_string()).collect();
    EditAction::new(
        String::new(),
        ActionPayload::AddLabels {
            item_indices: vec![item_index],
            labels: vec![vec![label]],
            shapes: vec![vec![shapes]],
        },
    )
}

/// Build an action deleting labels. `label_ids[i]` are removed from `item_indices[i]`.
pub fn delete_labels(item_indices: Vec<usize>, label_ids: Vec<Vec<String>>) -> EditAction {
    EditAction::new(
        String::new(),
        ActionPayload::DeleteLabels {
            item_indices,
            label_ids,
        },
    )
}
