//! Label Bot Common Types
//!
//! Shared types used by labeling sessions and the bot runner: edit actions,
//! the document snapshot, label export format and sync protocol messages.

pub mod action;
pub mod export;
pub mod protocol;
pub mod query;
pub mod state;

pub use action::{
    add_box2d_label, add_polygon2d_label, delete_labels, ActionPayload, EditAction, Label,
    LabelKind, Node2d, PathPoint2d, PathPointKind, Rect, Shape,
};
pub use export::{convert_polygon_to_export, Box2d, LabelExport, PolygonExport};
pub use protocol::{
    task_id, ActionPacket, BotData, ClientEvent, RegisterMessage, ServerEvent, SyncMessage,
};
pub use query::{ModelQuery, ModelType, QueryType};
pub use state::{ItemState, State, TaskConfig, TaskState};

/// Generate a fresh unique id for packets, labels and shapes.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
