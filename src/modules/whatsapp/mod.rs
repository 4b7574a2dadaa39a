//! WhatsApp Web client seam.
//!
//! Directory structure:
//! - `mod.rs`: `WhatsAppClient` trait, message payloads, chat-id helpers
//! - `evolution.rs`: client backed by an Evolution API gateway
//! - `webhook.rs`: gateway webhook payloads → `ClientEvent`s

pub mod evolution;
pub mod webhook;

pub use evolution::EvolutionClient;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppResult;

/// Suffix WhatsApp Web uses for one-to-one chats.
pub const CHAT_SUFFIX: &str = "@c.us";

/// Operations the gateway needs from a WhatsApp Web client.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    /// Start (or restart) session negotiation. QR challenges and readiness
    /// arrive later as lifecycle events.
    async fn initialize(&self) -> AppResult<()>;

    async fn send_message(&self, chat_id: &str, text: &str) -> AppResult<()>;

    async fn send_buttons(&self, chat_id: &str, message: &ButtonMessage) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonMessage {
    pub body: String,
    pub title: Option<String>,
    pub footer: Option<String>,
    pub buttons: Vec<Button>,
}

impl ButtonMessage {
    /// Build from comma-separated labels. Blank labels are skipped; ids are `btn-<n>`.
    pub fn from_labels(body: &str, labels: &str) -> Self {
        let buttons = labels
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, text)| Button { id: format!("btn-{}", i + 1), text: text.to_string() })
            .collect();
        Self {
            body: body.to_string(),
            title: None,
            footer: None,
            buttons,
        }
    }
}

/// `15550001234` → `15550001234@c.us`. Ids that already carry a domain pass through.
pub fn format_chat_id(number: &str) -> String {
    let number = number.trim();
    if number.contains('@') {
        number.to_string()
    } else {
        format!("{}{}", number, CHAT_SUFFIX)
    }
}

/// `15550001234@c.us` / `15550001234@s.whatsapp.net` → `15550001234`.
pub fn strip_chat_suffix(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording client used by router and API tests.

    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct MockClient {
        pub fail_sends: bool,
        pub fail_init: bool,
        pub init_calls: Mutex<u32>,
        pub sent: Mutex<Vec<(String, String)>>,
        pub sent_buttons: Mutex<Vec<(String, ButtonMessage)>>,
    }

    impl MockClient {
        pub fn failing() -> Self {
            Self { fail_sends: true, ..Default::default() }
        }

        pub fn failing_init() -> Self {
            Self { fail_init: true, ..Default::default() }
        }

        pub fn init_count(&self) -> u32 {
            *self.init_calls.lock()
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl WhatsAppClient for MockClient {
        async fn initialize(&self) -> AppResult<()> {
            *self.init_calls.lock() += 1;
            if self.fail_init {
                return Err(AppError::Client { status: 401, message: "bad api key".into() });
            }
            Ok(())
        }

        async fn send_message(&self, chat_id: &str, text: &str) -> AppResult<()> {
            if self.fail_sends {
                return Err(AppError::Client { status: 503, message: "rate limited".into() });
            }
            self.sent.lock().push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_buttons(&self, chat_id: &str, message: &ButtonMessage) -> AppResult<()> {
            if self.fail_sends {
                return Err(AppError::Client { status: 503, message: "rate limited".into() });
            }
            self.sent_buttons.lock().push((chat_id.to_string(), message.clone()));
            Ok(())
        }
    }
}
