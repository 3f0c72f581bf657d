//! Shared application state.

use std::sync::Arc;

use crate::bot::BotRegistry;
use crate::config::Config;
use crate::deployment::DeploymentClient;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub bots: Arc<BotRegistry>,
    pub deployment: Arc<DeploymentClient>,
}

impl AppState {
    pub fn new(config: Config, bots: Arc<BotRegistry>, deployment: Arc<DeploymentClient>) -> Self {
        Self {
            config,
            bots,
            deployment,
        }
    }
}
