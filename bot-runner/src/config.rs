//! Configuration for the bot runner.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use labelbot_common::ModelType;

/// Main configuration structure for the bot runner.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub model_server: ModelServerConfig,
    /// Bots to start, one session per entry.
    #[serde(default)]
    pub bots: Vec<BotEntry>,
}

/// Status API listen address.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Sync server WebSocket connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// WebSocket url of the sync server.
    pub ws_url: String,
    /// Address advertised in registration messages. Defaults to `ws_url`.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl SyncConfig {
    pub fn advertised_address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.ws_url)
    }
}

/// Model deployment service.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelServerConfig {
    pub base_url: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_num_gpus")]
    pub num_gpus: u32,
    /// Upper bound for every call to the model server.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    /// Model types deployed at startup.
    #[serde(default = "default_deploy_on_start")]
    pub deploy_on_start: Vec<ModelType>,
}

/// A bot to run against one task.
#[derive(Debug, Clone, Deserialize)]
pub struct BotEntry {
    pub project_name: String,
    pub task_index: usize,
    #[serde(default = "default_bot_id")]
    pub bot_id: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8090
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_project_id() -> String {
    "scalabelProjectId".to_string()
}
fn default_num_gpus() -> u32 {
    1
}
fn default_rpc_timeout() -> u64 {
    30
}
fn default_deploy_on_start() -> Vec<ModelType> {
    vec![ModelType::InstanceSegmentation]
}
fn default_bot_id() -> String {
    "labelbot".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (LABELBOT__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .set_default("sync.reconnect_delay_secs", default_reconnect_delay() as i64)?
            .set_default("model_server.rpc_timeout_secs", default_rpc_timeout() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("LABELBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
