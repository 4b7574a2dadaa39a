//! WhatsApp session state, the pending QR challenge and the connection status.
//!
//! Directory structure:
//! - `mod.rs`: `SessionState` holder, `ConnectionStatus`
//! - `events.rs`: `ClientEvent` and the router that mutates this state

pub mod events;

pub use events::{run_event_loop, ClientEvent, EventRouter, InboundMessage};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Ready,
}

#[derive(Debug)]
struct Inner {
    challenge: Option<String>,
    status: ConnectionStatus,
    changed_at: DateTime<Utc>,
    reconnect_attempts: u32,
}

/// Read-only view served by `/status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub has_qr: bool,
    #[schema(value_type = String)]
    pub status_changed_at: DateTime<Utc>,
    pub reconnect_attempts: u32,
}

/// Shared between the event router (writer) and the HTTP handlers (readers).
#[derive(Debug)]
pub struct SessionState {
    inner: RwLock<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                challenge: None,
                status: ConnectionStatus::Disconnected,
                changed_at: Utc::now(),
                reconnect_attempts: 0,
            }),
        }
    }

    pub fn set_challenge(&self, token: impl Into<String>) {
        let token = token.into();
        self.inner.write().challenge = if token.is_empty() { None } else { Some(token) };
    }

    pub fn clear_challenge(&self) {
        self.inner.write().challenge = None;
    }

    pub fn challenge(&self) -> Option<String> {
        self.inner.read().challenge.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.read().status
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let mut inner = self.inner.write();
        if inner.status != status {
            inner.status = status;
            inner.changed_at = Utc::now();
        }
    }

    /// Move to `to` only while the status is still `from`.
    pub(crate) fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        let mut inner = self.inner.write();
        if inner.status != from {
            return false;
        }
        if from != to {
            inner.status = to;
            inner.changed_at = Utc::now();
        }
        true
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ConnectionStatus::Ready
    }

    pub(crate) fn record_reconnect_attempt(&self) -> u32 {
        let mut inner = self.inner.write();
        inner.reconnect_attempts += 1;
        inner.reconnect_attempts
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read();
        SessionSnapshot {
            status: inner.status,
            has_qr: inner.challenge.is_some(),
            status_changed_at: inner.changed_at,
            reconnect_attempts: inner.reconnect_attempts,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
