//! Registry of running bot sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{Session, SessionStatus};

/// Registry of all running sessions, keyed by session id.
///
/// Each session sits behind its own mutex. The connection task holds it for
/// the whole of an event, inference included, so `statuses()` and any
/// status request touching a busy session wait until the event is done
/// (at most the model server timeout per query type).
pub struct BotRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session under its session id.
    pub async fn register(&self, session: Arc<Mutex<Session>>) {
        let session_id = session.lock().await.session_id().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, session);
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Status of every session, ordered by session id.
    pub async fn statuses(&self) -> Vec<SessionStatus> {
        // Clone sessions to avoid holding the registry lock across session locks
        let sessions: Vec<Arc<Mutex<Session>>> = {
            let guard = self.sessions.read().await;
            guard.values().cloned().collect()
        };

        let mut statuses = Vec::with_capacity(sessions.len());
        for session in sessions {
            statuses.push(session.lock().await.status());
        }
        statuses.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        statuses
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Kill every session.
    pub async fn kill_all(&self) {
        let sessions: Vec<Arc<Mutex<Session>>> = {
            let guard = self.sessions.read().await;
            guard.values().cloned().collect()
        };
        for session in sessions {
            session.lock().await.kill();
        }
    }
}

impl Default for BotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::SessionState;
    use crate::deployment::DeploymentClient;
    use crate::test_util::MockDeploymentService;
    use labelbot_common::BotData;
    use tokio::sync::mpsc;

    fn session(task_index: usize) -> Arc<Mutex<Session>> {
        let client = Arc::new(DeploymentClient::new(
            Arc::new(MockDeploymentService::new()),
            "p",
        ));
        let (tx, _rx) = mpsc::channel(4);
        let data = BotData {
            project_name: "proj".to_string(),
            task_index,
            bot_id: "bot".to_string(),
            address: "ws://localhost".to_string(),
        };
        Arc::new(Mutex::new(Session::new(data, client, tx)))
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = BotRegistry::new();
        let s = session(1);
        let id = s.lock().await.session_id().to_string();
        registry.register(s).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_some());
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_statuses_and_kill_all() {
        let registry = BotRegistry::new();
        registry.register(session(1)).await;
        registry.register(session(2)).await;

        let statuses = registry.statuses().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| s.state == SessionState::Unregistered));

        registry.kill_all().await;
        let statuses = registry.statuses().await;
        assert!(statuses.iter().all(|s| s.state == SessionState::Closed));
    }

    #[tokio::test]
    async fn test_statuses_wait_for_busy_session() {
        let registry = Arc::new(BotRegistry::new());
        let s = session(1);
        registry.register(s.clone()).await;

        let guard = s.lock().await;
        let reader = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.statuses().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        drop(guard);
        let statuses = reader.await.unwrap();
        assert_eq!(statuses.len(), 1);
    }
}
