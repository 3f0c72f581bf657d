//! Labelbot - runs labeling bots against a sync server and serves their status.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bot_runner::api;
use bot_runner::bot::{BotRegistry, Session};
use bot_runner::config::Config;
use bot_runner::deployment::{DeploymentClient, HttpDeploymentService};
use bot_runner::state::AppState;
use bot_runner::sync::SessionConnection;
use labelbot_common::BotData;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("labelbot {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure config.toml exists or set LABELBOT__SYNC__WS_URL and \
             LABELBOT__MODEL_SERVER__BASE_URL environment variables.",
            e
        )
    })?;
    tracing::info!("Starting labelbot {} with {} bots", VERSION, config.bots.len());

    // Deployment client shared by every session
    let service = Arc::new(HttpDeploymentService::new(&config.model_server.base_url));
    let deployment = Arc::new(
        DeploymentClient::new(service, config.model_server.project_id.clone())
            .with_num_gpus(config.model_server.num_gpus)
            .with_rpc_timeout(Duration::from_secs(config.model_server.rpc_timeout_secs)),
    );

    for model_type in &config.model_server.deploy_on_start {
        match deployment.deploy(*model_type).await {
            Ok(()) => tracing::info!("Deployed {} model", model_type),
            Err(e) => tracing::warn!("Could not deploy {} model: {}", model_type, e),
        }
    }

    // Start one session per configured bot
    let bots = Arc::new(BotRegistry::new());
    for entry in &config.bots {
        let data = BotData {
            project_name: entry.project_name.clone(),
            task_index: entry.task_index,
            bot_id: entry.bot_id.clone(),
            address: config.sync.advertised_address().to_string(),
        };
        let (tx, rx) = mpsc::channel(32);
        let session = Arc::new(Mutex::new(Session::new(data, deployment.clone(), tx)));
        bots.register(session.clone()).await;

        let connection = SessionConnection::new(config.sync.clone(), session, rx);
        tokio::spawn(async move {
            connection.run().await;
        });
        tracing::info!(
            "Bot started for {} task {}",
            entry.project_name,
            entry.task_index
        );
    }

    if config.bots.is_empty() {
        tracing::warn!("No bots configured, serving status API only");
    }

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let state = Arc::new(AppState::new(config, bots, deployment));
    let app = api::app(state);

    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
