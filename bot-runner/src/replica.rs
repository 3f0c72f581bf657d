//! Local replica of the task document.
//!
//! The replica is rebuilt by dispatching edit actions in the order they are
//! received. Only the present state is kept.

use labelbot_common::{ActionPayload, EditAction, Shape, State};

/// Action-dispatch document store.
pub trait DocumentStore: Send + Sync {
    /// Apply one action to the present state.
    fn dispatch(&mut self, action: &EditAction);

    /// The present state.
    fn snapshot(&self) -> &State;
}

/// In-memory document store holding the present state.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    state: State,
}

impl Replica {
    pub fn new(state: State) -> Self {
        Self { state }
    }

    fn add_labels(
        &mut self,
        item_indices: &[usize],
        labels: &[Vec<labelbot_common::Label>],
        shapes: &[Vec<Vec<Shape>>],
    ) {
        for (i, &index) in item_indices.iter().enumerate() {
            let Some(item) = self.state.task.items.get_mut(index) else {
                tracing::warn!("add_labels targets unknown item {}", index);
                continue;
            };
            let item_labels = labels.get(i).map(Vec::as_slice).unwrap_or_default();
            let item_shapes = shapes.get(i).map(Vec::as_slice).unwrap_or_default();
            for (j, label) in item_labels.iter().enumerate() {
                let mut label = label.clone();
                label.item = Some(index);
                let label_shapes = item_shapes.get(j).map(Vec::as_slice).unwrap_or_default();
                label.shapes = label_shapes.iter().map(|s| s.id().to_string()).collect();
                for shape in label_shapes {
                    item.shapes.insert(shape.id().to_string(), shape.clone());
                }
                item.labels.insert(label.id.clone(), label);
            }
        }
    }

    fn change_shapes(&mut self, item_indices: &[usize], shape_ids: &[Vec<String>], shapes: &[Vec<Shape>]) {
        for (i, &index) in item_indices.iter().enumerate() {
            let Some(item) = self.state.task.items.get_mut(index) else {
                tracing::warn!("change_shapes targets unknown item {}", index);
                continue;
            };
            let ids = shape_ids.get(i).map(Vec::as_slice).unwrap_or_default();
            let new_shapes = shapes.get(i).map(Vec::as_slice).unwrap_or_default();
            for (id, shape) in ids.iter().zip(new_shapes) {
                if let Some(existing) = item.shapes.get_mut(id) {
                    *existing = shape.clone();
                }
            }
        }
    }

    fn delete_labels(&mut self, item_indices: &[usize], label_ids: &[Vec<String>]) {
        for (i, &index) in item_indices.iter().enumerate() {
            let Some(item) = self.state.task.items.get_mut(index) else {
                tracing::warn!("delete_labels targets unknown item {}", index);
                continue;
            };
            for id in label_ids.get(i).map(Vec::as_slice).unwrap_or_default() {
                if let Some(label) = item.labels.remove(id) {
                    for shape_id in &label.shapes {
                        item.shapes.remove(shape_id);
                    }
                }
            }
        }
    }
}

impl DocumentStore for Replica {
    fn dispatch(&mut self, action: &EditAction) {
        match &action.payload {
            ActionPayload::AddLabels {
                item_indices,
                labels,
                shapes,
            } => self.add_labels(item_indices, labels, shapes),
            ActionPayload::ChangeShapes {
                item_indices,
                shape_ids,
                shapes,
            } => self.change_shapes(item_indices, shape_ids, shapes),
            ActionPayload::DeleteLabels {
                item_indices,
                label_ids,
            } => self.delete_labels(item_indices, label_ids),
            ActionPayload::Other => {}
        }
    }

    fn snapshot(&self) -> &State {
        &self.state
    }
}
