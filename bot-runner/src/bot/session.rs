//! Bot session: mirrors one task's document and synthesizes labels.
//!
//! A session registers with the sync server, keeps a replica of the task
//! document from the broadcast action stream, and answers each admitted
//! packet with model predictions that are broadcast back as a new packet.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;

use labelbot_common::{
    delete_labels, task_id, ActionPacket, BotData, ClientEvent, EditAction, QueryType,
    RegisterMessage, State, SyncMessage,
};

use super::batch::QueryBatch;
use super::classifier::{build_result_action, classify};
use crate::deployment::DeploymentClient;
use crate::replica::{DocumentStore, Replica};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unregistered,
    AwaitingAck,
    Synced,
    /// Killed; no further events are processed.
    Closed,
}

/// Point-in-time view of a session, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    #[serde(flatten)]
    pub data: BotData,
    pub state: SessionState,
    pub action_count: usize,
    pub admitted_packets: usize,
    pub label_count: usize,
    pub last_packet_at: Option<DateTime<Utc>>,
}

/// A bot participant in one task.
pub struct Session {
    data: BotData,
    session_id: String,
    state: SessionState,
    replica: Replica,
    action_log: Vec<EditAction>,
    admitted_packets: HashSet<String>,
    action_count: usize,
    last_packet_at: Option<DateTime<Utc>>,
    deployment: Arc<DeploymentClient>,
    outbound: Option<mpsc::Sender<ClientEvent>>,
}

impl Session {
    /// Create a session with a fresh session id.
    ///
    /// Events for the sync server are written to `outbound`.
    pub fn new(
        data: BotData,
        deployment: Arc<DeploymentClient>,
        outbound: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            data,
            session_id: labelbot_common::new_id(),
            state: SessionState::Unregistered,
            replica: Replica::default(),
            action_log: Vec::new(),
            admitted_packets: HashSet::new(),
            action_count: 0,
            last_packet_at: None,
            deployment,
            outbound: Some(outbound),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn data(&self) -> &BotData {
        &self.data
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The current replica snapshot.
    pub fn document(&self) -> &State {
        self.replica.snapshot()
    }

    /// Foreign actions applied so far, in receipt order.
    pub fn action_log(&self) -> &[EditAction] {
        &self.action_log
    }

    /// Number of foreign actions received since the last reset.
    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn reset_action_count(&mut self) {
        self.action_count = 0;
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id.clone(),
            data: self.data.clone(),
            state: self.state,
            action_count: self.action_count,
            admitted_packets: self.admitted_packets.len(),
            label_count: self.replica.snapshot().label_count(),
            last_packet_at: self.last_packet_at,
        }
    }

    /// Send the registration message for this session.
    pub async fn handle_registration(&mut self) {
        if self.is_closed() {
            return;
        }
        let message = RegisterMessage {
            project_name: self.data.project_name.clone(),
            task_index: self.data.task_index,
            session_id: self.session_id.clone(),
            user_id: self.data.bot_id.clone(),
            address: self.data.address.clone(),
            bot: true,
        };
        self.state = SessionState::AwaitingAck;
        self.send(ClientEvent::Register(message)).await;
        tracing::info!(
            "Sent registration for {} task {} (session {})",
            self.data.project_name,
            self.data.task_index,
            self.session_id
        );
    }

    /// Replace the replica with the document from the registration ack.
    pub fn on_registration_ack(&mut self, state: State) {
        if self.is_closed() {
            return;
        }
        self.replica = Replica::new(state);
        self.state = SessionState::Synced;
        tracing::info!(
            "Session {} synced with {} items",
            self.session_id,
            self.replica.snapshot().task.items.len()
        );
    }

    /// Process a broadcast packet and return the actions synthesized for it.
    ///
    /// Packets already seen, packets from bots and our own packets are
    /// dropped. Inference failures only drop the predictions of the
    /// affected query type.
    pub async fn on_action_broadcast(&mut self, message: &SyncMessage) -> Vec<EditAction> {
        if self.is_closed() {
            return Vec::new();
        }
        let packet = &message.actions;
        if self.admitted_packets.contains(&packet.id)
            || message.bot
            || message.session_id == self.session_id
        {
            tracing::debug!("Ignoring packet {} from {}", packet.id, message.session_id);
            return Vec::new();
        }
        self.admitted_packets.insert(packet.id.clone());
        self.last_packet_at = Some(Utc::now());

        let mut batch = QueryBatch::new();
        for action in &packet.actions {
            if action.session_id == self.session_id {
                continue;
            }
            self.action_count += 1;
            self.action_log.push(action.clone());
            self.replica.dispatch(action);
            tracing::debug!("Bot received action of type {}", action.kind());

            batch.add(classify(self.replica.snapshot(), action));
        }

        let actions = self.execute_queries(&batch).await;

        for action in &actions {
            self.replica.dispatch(action);
        }

        if !actions.is_empty() {
            self.broadcast_actions(actions.clone(), &packet.id).await;
        }

        actions
    }

    /// Close the session. The outbound channel is dropped, which ends the
    /// connection, and later events are ignored.
    pub fn kill(&mut self) {
        self.state = SessionState::Closed;
        self.outbound = None;
        tracing::info!("Session {} closed", self.session_id);
    }

    /// Run every query type of the batch concurrently and merge the results
    /// in query type order.
    async fn execute_queries(&self, batch: &QueryBatch) -> Vec<EditAction> {
        if batch.is_empty() {
            return Vec::new();
        }
        tracing::info!(
            "Dispatching {} queries across {} query types",
            batch.len(),
            batch.query_types().len()
        );
        let calls = batch
            .query_types()
            .into_iter()
            .map(|query_type| self.execute_query_type(batch, query_type));
        join_all(calls).await.into_iter().flatten().collect()
    }

    async fn execute_query_type(&self, batch: &QueryBatch, query_type: QueryType) -> Vec<EditAction> {
        let item_indices = batch.item_indices(query_type);
        let label_lists = batch.label_lists(query_type);

        let response = match self
            .deployment
            .infer(query_type, batch.urls(query_type), &label_lists)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    "{} inference at {} failed: {}",
                    query_type,
                    self.deployment.endpoint(),
                    e
                );
                return Vec::new();
            }
        };
        tracing::info!(
            "Got {} results for {} query: {}",
            response.instance_segmentation_results.len(),
            query_type,
            response.message
        );

        let results = &response.instance_segmentation_results;
        if results.len() != item_indices.len() {
            tracing::warn!(
                "{} query returned {} results for {} items",
                query_type,
                results.len(),
                item_indices.len()
            );
        }

        // Only labels of items that received a prediction are superseded
        let mut actions = Vec::new();
        let mut superseded_items = Vec::new();
        let mut superseded_ids = Vec::new();
        for ((result, &item_index), label_ids) in results
            .iter()
            .zip(&item_indices)
            .zip(batch.label_ids(query_type))
        {
            if result.polygons.is_empty() {
                continue;
            }
            for polygon in &result.polygons {
                actions.push(build_result_action(
                    &polygon.vertices(),
                    item_index,
                    &self.session_id,
                ));
            }
            superseded_items.push(item_index);
            superseded_ids.push(label_ids);
        }

        if !actions.is_empty() {
            let mut delete = delete_labels(superseded_items, superseded_ids);
            delete.session_id = self.session_id.clone();
            actions.push(delete);
        }
        actions
    }

    /// Broadcast synthesized actions as a new packet triggered by `trigger_id`.
    async fn broadcast_actions(&self, actions: Vec<EditAction>, trigger_id: &str) {
        let message = SyncMessage {
            task_id: task_id(self.data.task_index),
            project_name: self.data.project_name.clone(),
            session_id: self.session_id.clone(),
            actions: ActionPacket::new(actions, Some(trigger_id.to_string())),
            bot: true,
        };
        self.send(ClientEvent::ActionSend(message)).await;
    }

    async fn send(&self, event: ClientEvent) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        if outbound.send(event).await.is_err() {
            tracing::warn!("Session {}: outbound channel closed", self.session_id);
        }
    }
}
