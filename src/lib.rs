pub mod error;
pub mod models;
pub mod modules;
pub mod utils;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use modules::api_server::{self, AppState};
use modules::logger;
use modules::session::{run_event_loop, ConnectionStatus, EventRouter, SessionState};
use modules::whatsapp::{EvolutionClient, WhatsAppClient};

/// Lifecycle events buffered between the webhook and the router.
const EVENT_BUFFER: usize = 64;

pub async fn run() -> anyhow::Result<()> {
    let config = modules::load_app_config()?;

    // Keep the guard alive for the whole process or file logs are dropped.
    let _log_guard = logger::init_logger(&config.log_level);
    info!("wagate v{} starting", env!("CARGO_PKG_VERSION"));
    match modules::write_default_config() {
        Ok(Some(path)) => info!("Wrote default config to {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Could not write default config: {}", e),
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let session = Arc::new(SessionState::new());
    let client: Arc<dyn WhatsAppClient> = Arc::new(EvolutionClient::new(config.evolution.clone(), tx.clone()));

    let router = EventRouter::new(session.clone(), client.clone(), config.ping_reply);
    tokio::spawn(run_event_loop(router, rx));

    // Set before initialize(); a Ready it emits must land after this.
    session.set_status(ConnectionStatus::Connecting);
    {
        let client = client.clone();
        let session = session.clone();
        tokio::spawn(async move {
            info!("Initializing WhatsApp client...");
            if let Err(e) = client.initialize().await {
                error!("Failed to initialize WhatsApp client: {}", e);
                session.transition(ConnectionStatus::Connecting, ConnectionStatus::Disconnected);
            }
        });
    }

    let state = AppState::new(&config, session, client, tx);
    api_server::serve(&config.listen_addr(), state).await?;
    Ok(())
}
