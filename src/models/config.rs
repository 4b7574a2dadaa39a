use serde::{Deserialize, Serialize};

/// Evolution API gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Evolution API base URL
    pub api_url: String,
    /// Global API key sent in the `apikey` header
    pub api_key: String,
    /// Instance name registered with the gateway
    pub instance_name: String,
    /// URL the gateway posts lifecycle webhooks to (this server's `/webhook/whatsapp`)
    pub webhook_url: String,
    /// Keep the paired session between restarts instead of forcing a fresh QR login
    pub persist_session: bool,
    /// Timeout for every request made to the gateway
    pub request_timeout_secs: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            instance_name: "wagate".to_string(),
            webhook_url: "http://127.0.0.1:3000/webhook/whatsapp".to_string(),
            persist_session: true,
            request_timeout_secs: 30,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    /// Refuse sends while the client is not `Ready`
    pub require_ready: bool,
    /// Answer an incoming `!ping` with `pong`
    pub ping_reply: bool,
    /// Fallback number for `/send-button` when the request carries none
    pub default_recipient: Option<String>,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub evolution: EvolutionConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            require_ready: true,
            ping_reply: true,
            default_recipient: None,
            log_level: "info".to_string(),
            evolution: EvolutionConfig::default(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
