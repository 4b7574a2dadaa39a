//! Lifecycle event routing.
//!
//! The WhatsApp client reports its lifecycle through `ClientEvent`s, applied
//! one at a time by `run_event_loop`. Reconnects run on their own task: the
//! client may push events into the same channel while it negotiates, so the
//! loop never waits on `initialize()`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{ConnectionStatus, SessionState};
use crate::modules::whatsapp::WhatsAppClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    /// Sender number without the chat suffix
    pub from: String,
    /// Chat the message arrived in (replies go here)
    pub chat_id: String,
    pub push_name: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Qr(String),
    Ready,
    Authenticated,
    AuthFailure(String),
    Disconnected(String),
    MessageReceived(InboundMessage),
    Error(String),
}

pub struct EventRouter {
    state: Arc<SessionState>,
    client: Arc<dyn WhatsAppClient>,
    ping_reply: bool,
}

impl EventRouter {
    pub fn new(state: Arc<SessionState>, client: Arc<dyn WhatsAppClient>, ping_reply: bool) -> Self {
        Self { state, client, ping_reply }
    }

    /// Apply one event. Returns the reconnect task when the event started one.
    pub async fn dispatch(&self, event: ClientEvent) -> Option<JoinHandle<()>> {
        match event {
            ClientEvent::Qr(code) => {
                self.state.set_challenge(code);
                self.state.set_status(ConnectionStatus::Connecting);
                info!("[Router] QR code received. Scan it using WhatsApp.");
            }
            ClientEvent::Ready => {
                self.state.clear_challenge();
                self.state.set_status(ConnectionStatus::Ready);
                info!("[Router] WhatsApp client is ready!");
            }
            ClientEvent::Authenticated => {
                info!("[Router] WhatsApp client authenticated!");
            }
            ClientEvent::AuthFailure(reason) => {
                self.state.set_status(ConnectionStatus::Disconnected);
                error!("[Router] Authentication failed: {}", reason);
            }
            ClientEvent::Disconnected(reason) => {
                info!("[Router] Client was disconnected: {}", reason);
                self.state.clear_challenge();
                self.state.set_status(ConnectionStatus::Disconnected);
                return Some(self.reconnect());
            }
            ClientEvent::MessageReceived(msg) => self.on_message(msg).await,
            ClientEvent::Error(err) => {
                error!("[Router] WhatsApp client error: {}", err);
            }
        }
        None
    }

    /// Single attempt, no backoff; the next `Disconnected` triggers the next attempt.
    fn reconnect(&self) -> JoinHandle<()> {
        let attempt = self.state.record_reconnect_attempt();
        self.state.set_status(ConnectionStatus::Connecting);
        info!("[Router] Reconnecting (attempt {})", attempt);

        let state = self.state.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.initialize().await {
                error!("[Router] Reconnect failed: {}", e);
                state.transition(ConnectionStatus::Connecting, ConnectionStatus::Disconnected);
            }
        })
    }

    async fn on_message(&self, msg: InboundMessage) {
        info!("[Router] Message received from {}: {}", msg.from, msg.body);

        if self.ping_reply && msg.body == "!ping" {
            if let Err(e) = self.client.send_message(&msg.chat_id, "pong").await {
                warn!("[Router] Failed to answer !ping from {}: {}", msg.from, e);
            }
        }
    }
}

/// Apply events in arrival order until every sender is dropped.
pub async fn run_event_loop(router: EventRouter, mut rx: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = rx.recv().await {
        let _ = router.dispatch(event).await;
    }
    info!("[Router] Event channel closed, loop ended");
}
