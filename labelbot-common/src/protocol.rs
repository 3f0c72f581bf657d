//! WebSocket protocol types for session synchronization.
//!
//! Sessions (human or bot) exchange JSON-encoded events with the sync
//! server over a WebSocket. Each event has a `type` field that determines
//! its structure.
//!
//! ## Connection Flow
//!
//! 1. Session connects to the sync server
//! 2. Session sends `register` with its project, task and session ids
//! 3. Server responds with `register_ack` carrying the full document state
//! 4. Server forwards every packet of actions as `action_broadcast`
//! 5. Session publishes its own actions with `action_send`
//!
//! A packet is identified by its id, so receivers can drop packets they
//! have already applied. Packets produced by a bot carry `bot = true` and
//! the id of the packet that triggered them, which keeps bots from
//! reacting to each other.

use serde::{Deserialize, Serialize};

use crate::action::EditAction;
use crate::state::State;

/// Events sent from a session to the sync server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Registration when connecting.
    Register(RegisterMessage),
    /// A packet of actions to broadcast to the task's other sessions.
    ActionSend(SyncMessage),
}

/// Events sent from the sync server to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledgment of registration, with the current document.
    RegisterAck { state: State },
    /// A packet of actions from some session of the task.
    ActionBroadcast(SyncMessage),
    /// Error message from the server.
    Error { code: String, message: String },
}

/// Registration data sent on connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMessage {
    pub project_name: String,
    pub task_index: usize,
    pub session_id: String,
    /// User id; for bots, the bot id.
    pub user_id: String,
    /// Address of the sync server.
    pub address: String,
    /// Whether the session is a bot.
    pub bot: bool,
}

/// Envelope for a packet of actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Zero-padded task index, see [`task_id`].
    pub task_id: String,
    pub project_name: String,
    /// Session that sent the packet.
    pub session_id: String,
    pub actions: ActionPacket,
    /// Set on packets produced by bots; they must not trigger bot processing.
    #[serde(default)]
    pub bot: bool,
}

/// An ordered group of actions, deduplicated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPacket {
    pub actions: Vec<EditAction>,
    pub id: String,
    /// For bot packets, the id of the packet that triggered them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
}

impl ActionPacket {
    /// Create a packet with a fresh id.
    pub fn new(actions: Vec<EditAction>, trigger_id: Option<String>) -> Self {
        Self {
            actions,
            id: crate::new_id(),
            trigger_id,
        }
    }
}

/// Identity of a bot and the task it works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotData {
    pub project_name: String,
    pub task_index: usize,
    pub bot_id: String,
    /// Address of the sync server.
    pub address: String,
}

/// Task id string for a task index.
pub fn task_id(task_index: usize) -> String {
    format!("{:06}", task_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_padding() {
        assert_eq!(task_id(0), "000000");
        assert_eq!(task_id(42), "000042");
    }

    #[test]
    fn test_register_serialization() {
        let msg = ClientEvent::Register(RegisterMessage {
            project_name: "proj".to_string(),
            task_index: 3,
            session_id: "sess".to_string(),
            user_id: "bot-1".to_string(),
            address: "ws://localhost:8686".to_string(),
            bot: true,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"register""#));
        assert!(json.contains(r#""bot":true"#));
    }

    #[test]
    fn test_action_broadcast_parse() {
        let json = r#"{
            "type": "action_broadcast",
            "task_id": "000000",
            "project_name": "proj",
            "session_id": "human",
            "actions": {
                "id": "packet-1",
                "actions": [
                    {"type": "delete_labels", "session_id": "human",
                     "item_indices": [0], "label_ids": [["l1"]]}
                ]
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ActionBroadcast(msg) => {
                assert_eq!(msg.actions.id, "packet-1");
                assert!(msg.actions.trigger_id.is_none());
                assert!(!msg.bot);
                assert_eq!(msg.actions.actions[0].kind(), "delete_labels");
            }
            _ => panic!("Expected ActionBroadcast"),
        }
    }

    #[test]
    fn test_register_ack_parse() {
        let json = r#"{"type": "register_ack", "state": {"task": {"items": []}}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::RegisterAck { .. }));
    }

    #[test]
    fn test_packet_ids_are_fresh() {
        let a = ActionPacket::new(vec![], None);
        let b = ActionPacket::new(vec![], Some(a.id.clone()));
        assert_ne!(a.id, b.id);
        assert_eq!(b.trigger_id.as_deref(), Some(a.id.as_str()));
    }
}
