//! Conversion between edit actions and model queries.
//!
//! Only label-creation actions are turned into queries. Boxes become
//! polygon predictions, polygons become refinements. An action is assumed to
//! carry a single label with a single shape group; only the first one is
//! consulted.

use labelbot_common::{
    add_polygon2d_label, convert_polygon_to_export, ActionPayload, EditAction, LabelExport,
    ModelQuery, PathPoint2d, PathPointKind, QueryType, Shape, State,
};

/// Convert an action to a query, resolving the image url from the state.
///
/// Returns `None` for actions that are not eligible for inference and for
/// actions whose target item has no url in `state`.
pub fn classify(state: &State, action: &EditAction) -> Option<ModelQuery> {
    let ActionPayload::AddLabels { item_indices, .. } = &action.payload else {
        return None;
    };
    let item_index = *item_indices.first()?;
    let Some(url) = state.item_url(item_index) else {
        tracing::debug!("No url for item {}, skipping query", item_index);
        return None;
    };
    action_to_query(action, url)
}

/// Convert an action to a query for the given image url.
pub fn action_to_query(action: &EditAction, url: &str) -> Option<ModelQuery> {
    let ActionPayload::AddLabels {
        item_indices,
        labels,
        shapes,
    } = &action.payload
    else {
        return None;
    };
    let item_index = *item_indices.first()?;
    let label = labels.first()?.first()?;
    let label_shapes = shapes.first()?.first()?;

    let (export, query_type) = match label_shapes.first()? {
        Shape::Rect(rect) => (LabelExport::from_box(&label.id, rect), QueryType::PredictPoly),
        Shape::PathPoint2d(_) => {
            let points: Vec<PathPoint2d> = label_shapes
                .iter()
                .filter_map(|shape| match shape {
                    Shape::PathPoint2d(point) => Some(point.clone()),
                    _ => None,
                })
                .collect();
            let polygons = convert_polygon_to_export(&points, label.kind);
            (
                LabelExport::from_polygons(&label.id, polygons),
                QueryType::RefinePoly,
            )
        }
        Shape::Node2d(_) => return None,
    };

    Some(ModelQuery {
        label: export,
        url: url.to_string(),
        query_type,
        item_index,
    })
}

/// Translate a predicted polygon into a label-creation action.
pub fn build_result_action(points: &[[f64; 2]], item_index: usize, session_id: &str) -> EditAction {
    let path = points
        .iter()
        .map(|[x, y]| PathPoint2d::new(*x, *y, PathPointKind::Line))
        .collect();
    let mut action = add_polygon2d_label(item_index, vec![0], path, true, false);
    action.session_id = session_id.to_string();
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelbot_common::{add_box2d_label, LabelKind, Node2d, Rect};

    const URL: &str = "testurl";

    #[test]
    fn test_rect_query_construction() {
        let rect = Rect::new(5.0, 2.0, 6.0, 10.0);
        let item_index = 1;
        let action = add_box2d_label(item_index, vec![], rect.clone());
        let query = action_to_query(&action, URL).expect("rect should be classified");

        assert_eq!(query.query_type, QueryType::PredictPoly);
        assert_eq!(query.item_index, item_index);
        assert_eq!(query.url, URL);

        let box2d = query.label.box2d.expect("box export");
        assert_eq!(box2d.x1, rect.x1);
        assert_eq!(box2d.y1, rect.y1);
        assert_eq!(box2d.x2, rect.x2);
        assert_eq!(box2d.y2, rect.y2);
        assert!(query.label.poly2d.is_none());
    }

    #[test]
    fn test_poly_query_construction() {
        let points = vec![
            PathPoint2d::new(0.0, 1.0, PathPointKind::Line),
            PathPoint2d::new(5.0, 3.0, PathPointKind::Line),
            PathPoint2d::new(7.0, 9.0, PathPointKind::Bezier),
        ];
        let item_index = 5;
        let action = add_polygon2d_label(item_index, vec![0], points.clone(), true, true);
        let query = action_to_query(&action, URL).expect("polygon should be classified");

        assert_eq!(query.query_type, QueryType::RefinePoly);
        assert_eq!(query.item_index, item_index);
        assert_eq!(query.url, URL);
        assert_eq!(
            query.label.poly2d,
            Some(convert_polygon_to_export(&points, LabelKind::Polygon2d))
        );
    }

    #[test]
    fn test_unsupported_shape_is_absent() {
        let mut action = add_box2d_label(0, vec![], Rect::new(0.0, 0.0, 1.0, 1.0));
        if let ActionPayload::AddLabels { shapes, .. } = &mut action.payload {
            shapes[0][0] = vec![Shape::Node2d(Node2d {
                id: "n".to_string(),
                x: 1.0,
                y: 1.0,
                name: "head".to_string(),
                hidden: false,
            })];
        }
        assert!(action_to_query(&action, URL).is_none());
    }

    #[test]
    fn test_non_label_actions_are_absent() {
        let delete = labelbot_common::delete_labels(vec![0], vec![vec!["l".to_string()]]);
        let state = State::with_items([URL]);
        assert!(classify(&state, &delete).is_none());
        assert!(classify(&state, &EditAction::new("s", ActionPayload::Other)).is_none());
    }

    #[test]
    fn test_classify_resolves_item_url() {
        let state = State::with_items(["a.jpg", "b.jpg"]);
        let action = add_box2d_label(1, vec![], Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(classify(&state, &action).unwrap().url, "b.jpg");

        let missing = add_box2d_label(9, vec![], Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(classify(&state, &missing).is_none());
    }

    #[test]
    fn test_build_result_action() {
        let points = [[1.0, 2.0], [3.0, 4.0], [5.0, 0.5]];
        let action = build_result_action(&points, 3, "bot-session");
        assert_eq!(action.session_id, "bot-session");
        assert_eq!(action.item_indices(), &[3]);

        match action.payload {
            ActionPayload::AddLabels { labels, shapes, .. } => {
                let label = &labels[0][0];
                assert_eq!(label.kind, LabelKind::Polygon2d);
                assert!(!label.manual);
                let shapes = &shapes[0][0];
                assert_eq!(shapes.len(), 3);
                match &shapes[2] {
                    Shape::PathPoint2d(p) => {
                        assert_eq!((p.x, p.y), (5.0, 0.5));
                        assert_eq!(p.point_type, PathPointKind::Line);
                    }
                    other => panic!("Expected path point, got {:?}", other),
                }
            }
            other => panic!("Expected add_labels, got {:?}", other),
        }
    }
}
