//! WebSocket connection between a bot session and the sync server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use labelbot_common::{ClientEvent, ServerEvent};

use crate::bot::Session;
use crate::config::SyncConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sync server connection for one session.
///
/// Handles connection lifecycle and forwards server events to the session.
/// Events written by the session to its outbound channel are sent to the
/// server.
pub struct SessionConnection {
    config: SyncConfig,
    session: Arc<Mutex<Session>>,
    outbound: mpsc::Receiver<ClientEvent>,
}

impl SessionConnection {
    pub fn new(
        config: SyncConfig,
        session: Arc<Mutex<Session>>,
        outbound: mpsc::Receiver<ClientEvent>,
    ) -> Self {
        Self {
            config,
            session,
            outbound,
        }
    }

    /// Run the connection with automatic reconnection until the session is
    /// killed.
    pub async fn run(mut self) {
        loop {
            if self.session.lock().await.is_closed() {
                break;
            }
            tracing::info!("Connecting to sync server at {}", self.config.ws_url);

            match self.connect_and_run().await {
                Ok(()) => {
                    tracing::info!("Sync connection closed normally");
                }
                Err(e) => {
                    tracing::error!("Sync connection error: {}", e);
                }
            }

            if self.session.lock().await.is_closed() {
                break;
            }
            tracing::info!(
                "Reconnecting in {} seconds...",
                self.config.reconnect_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay_secs)).await;
        }
        tracing::info!("Sync connection stopped");
    }

    /// Connect, register the session and run the message loop.
    async fn connect_and_run(&mut self) -> Result<(), BoxError> {
        let (ws_stream, _) = connect_async(&self.config.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Events queued while disconnected belong to the previous registration
        while self.outbound.try_recv().is_ok() {}

        self.session.lock().await.handle_registration().await;

        self.message_loop(&mut write, &mut read).await
    }

    async fn message_loop<S, R>(&mut self, write: &mut S, read: &mut R) -> Result<(), BoxError>
    where
        S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
        R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                // Drain outbound first so a session never waits on a full channel
                biased;

                event = self.outbound.recv() => {
                    let Some(event) = event else {
                        // Session killed
                        write.send(Message::Close(None)).await?;
                        return Ok(());
                    };
                    let json = serde_json::to_string(&event)?;
                    write.send(Message::Text(json)).await?;
                    tracing::debug!("Sent event to sync server: {}", event_name(&event));
                }

                Some(result) = read.next() => {
                    match result {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_server_event(&text).await {
                                tracing::error!("Error handling sync event: {}", e);
                            }
                        }
                        Ok(Message::Ping(data)) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Ok(Message::Close(_)) => {
                            tracing::info!("Sync server sent close frame");
                            return Ok(());
                        }
                        Ok(_) => {} // Ignore other message types
                        Err(e) => {
                            return Err(format!("WebSocket error: {}", e).into());
                        }
                    }
                }

                else => {
                    return Ok(());
                }
            }
        }
    }

    async fn handle_server_event(&self, text: &str) -> Result<(), BoxError> {
        let event: ServerEvent = serde_json::from_str(text)?;

        match event {
            ServerEvent::RegisterAck { state } => {
                self.session.lock().await.on_registration_ack(state);
            }

            ServerEvent::ActionBroadcast(message) => {
                let actions = self.session.lock().await.on_action_broadcast(&message).await;
                tracing::debug!(
                    "Packet {} produced {} bot actions",
                    message.actions.id,
                    actions.len()
                );
            }

            ServerEvent::Error { code, message } => {
                tracing::error!("Sync server error: {} - {}", code, message);
            }
        }

        Ok(())
    }
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::Register(_) => "register",
        ClientEvent::ActionSend(_) => "action_send",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::DeploymentClient;
    use crate::test_util::{box_action, initial_state, sync_message, MockDeploymentService};
    use labelbot_common::{BotData, ModelType};

    fn sync_config() -> SyncConfig {
        SyncConfig {
            ws_url: "ws://localhost:8686/sync".to_string(),
            address: None,
            reconnect_delay_secs: 5,
        }
    }

    async fn connection() -> (SessionConnection, Arc<Mutex<Session>>) {
        let service = Arc::new(MockDeploymentService::new());
        let client = DeploymentClient::new(service, "p");
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();
        let (tx, rx) = mpsc::channel(32);
        let data = BotData {
            project_name: "proj".to_string(),
            task_index: 0,
            bot_id: "bot".to_string(),
            address: "ws://localhost:8686/sync".to_string(),
        };
        let session = Arc::new(Mutex::new(Session::new(data, Arc::new(client), tx)));
        (SessionConnection::new(sync_config(), session.clone(), rx), session)
    }

    #[tokio::test]
    async fn test_server_events_reach_session() {
        let (mut conn, session) = connection().await;

        let ack = ServerEvent::RegisterAck { state: initial_state(3) };
        conn.handle_server_event(&serde_json::to_string(&ack).unwrap())
            .await
            .unwrap();
        assert_eq!(session.lock().await.document().task.items.len(), 3);

        let broadcast = ServerEvent::ActionBroadcast(sync_message(
            vec![box_action(0, 1, "human"), box_action(2, 2, "human")],
            "human",
        ));
        conn.handle_server_event(&serde_json::to_string(&broadcast).unwrap())
            .await
            .unwrap();
        assert_eq!(session.lock().await.action_count(), 2);

        match conn.outbound.try_recv().unwrap() {
            ClientEvent::ActionSend(sent) => assert_eq!(sent.actions.actions.len(), 3),
            other => panic!("Expected ActionSend, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_event_is_an_error() {
        let (conn, session) = connection().await;
        assert!(conn.handle_server_event("not json").await.is_err());
        assert!(conn
            .handle_server_event(r#"{"type": "unknown_event"}"#)
            .await
            .is_err());
        assert_eq!(session.lock().await.action_count(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_when_session_killed() {
        let (conn, session) = connection().await;
        session.lock().await.kill();
        // Must return without attempting to connect
        tokio::time::timeout(Duration::from_secs(1), conn.run())
            .await
            .unwrap();
    }
}
