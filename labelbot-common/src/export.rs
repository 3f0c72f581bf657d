//! Export representation of labels.
//!
//! This is the format exchanged with models: boxes as corner coordinates,
//! polygons as vertex lists with a per-vertex type string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::{LabelKind, PathPoint2d, PathPointKind, Rect};

/// Exported box, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box2d {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<&Rect> for Box2d {
    fn from(rect: &Rect) -> Self {
        Self {
            x1: rect.x1,
            y1: rect.y1,
            x2: rect.x2,
            y2: rect.y2,
        }
    }
}

/// Exported polygon or polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonExport {
    pub vertices: Vec<[f64; 2]>,
    /// One character per vertex: `L` for a vertex, `C` for a bezier control point.
    pub types: String,
    pub closed: bool,
}

impl PolygonExport {
    /// Smallest box containing every vertex. `None` for an empty polygon.
    pub fn bounding_box(&self) -> Option<Box2d> {
        let (first, rest) = self.vertices.split_first()?;
        let init = Box2d {
            x1: first[0],
            y1: first[1],
            x2: first[0],
            y2: first[1],
        };
        Some(rest.iter().fold(init, |b, [x, y]| Box2d {
            x1: b.x1.min(*x),
            y1: b.y1.min(*y),
            x2: b.x2.max(*x),
            y2: b.y2.max(*y),
        }))
    }
}

/// A label in export format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelExport {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub manual_shape: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box2d: Option<Box2d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poly2d: Option<Vec<PolygonExport>>,
}

impl LabelExport {
    pub fn from_box(id: impl Into<String>, rect: &Rect) -> Self {
        Self {
            id: id.into(),
            manual_shape: true,
            box2d: Some(Box2d::from(rect)),
            ..Default::default()
        }
    }

    pub fn from_polygons(id: impl Into<String>, polygons: Vec<PolygonExport>) -> Self {
        Self {
            id: id.into(),
            manual_shape: true,
            poly2d: Some(polygons),
            ..Default::default()
        }
    }

    /// The box sent to box-oriented models: the exported box if present,
    /// otherwise the bounding box of the exported polygons.
    pub fn bounding_box(&self) -> Option<Box2d> {
        if let Some(b) = self.box2d {
            return Some(b);
        }
        self.poly2d
            .as_ref()?
            .iter()
            .filter_map(PolygonExport::bounding_box)
            .reduce(|a, b| Box2d {
                x1: a.x1.min(b.x1),
                y1: a.y1.min(b.y1),
                x2: a.x2.max(b.x2),
                y2: a.y2.max(b.y2),
            })
    }
}

/// Convert the path points of a polygon or polyline label to export format.
///
/// Polygons are closed; every other label kind exports an open path.
pub fn convert_polygon_to_export(points: &[PathPoint2d], kind: LabelKind) -> Vec<PolygonExport> {
    let vertices = points.iter().map(|p| [p.x, p.y]).collect();
    let types = points
        .iter()
        .map(|p| match p.point_type {
            PathPointKind::Line => 'L',
            PathPointKind::Bezier => 'C',
        })
        .collect();
    vec![PolygonExport {
        vertices,
        types,
        closed: kind == LabelKind::Polygon2d,
    }]
}
