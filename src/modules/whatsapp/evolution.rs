//! `WhatsAppClient` backed by an Evolution API gateway.
//!
//! The gateway owns the WhatsApp Web session; this client creates/connects the
//! instance and sends messages. Lifecycle events come back through
//! `/webhook/whatsapp` (see `webhook.rs`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{strip_chat_suffix, ButtonMessage, WhatsAppClient};
use crate::error::{AppError, AppResult};
use crate::models::EvolutionConfig;
use crate::modules::session::ClientEvent;
use crate::utils::http::build_client;
use crate::utils::truncate::safe_truncate;

pub struct EvolutionClient {
    config: EvolutionConfig,
    http: reqwest::Client,
    events: mpsc::Sender<ClientEvent>,
}

impl EvolutionClient {
    pub fn new(config: EvolutionConfig, events: mpsc::Sender<ClientEvent>) -> Self {
        let http = build_client(config.request_timeout_secs);
        Self { config, http, events }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn instance(&self) -> String {
        urlencoding::encode(&self.config.instance_name).into_owned()
    }

    /// Create the instance. `Ok(None)` means it already exists.
    async fn create_instance(&self) -> AppResult<Option<Value>> {
        // A fresh token per instance avoids "token already exists" collisions.
        let token = format!("wagate-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let body = json!({
            "instanceName": self.config.instance_name,
            "token": token,
            "qrcode": true,
            "webhook": self.config.webhook_url,
        });

        info!("[Evolution] Creating instance '{}'", self.config.instance_name);

        let resp = self.http
            .post(self.url("instance/create"))
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        info!("[Evolution] Instance create response [{}]: {}", status, safe_truncate(&text, 300));

        if status.is_success() {
            return Ok(Some(serde_json::from_str(&text).unwrap_or_default()));
        }
        if is_conflict(status, &text) {
            return Ok(None);
        }
        Err(AppError::Client {
            status: status.as_u16(),
            message: safe_truncate(&text, 500).to_string(),
        })
    }

    async fn connect_instance(&self) -> AppResult<Value> {
        let resp = self.http
            .get(self.url(&format!("instance/connect/{}", self.instance())))
            .header("apikey", &self.config.api_key)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        info!("[Evolution] Connect instance response [{}]: {}", status, safe_truncate(&text, 300));

        if !status.is_success() {
            return Err(AppError::Client {
                status: status.as_u16(),
                message: safe_truncate(&text, 500).to_string(),
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    /// Best effort; a missing instance is not an error.
    async fn delete_instance(&self) {
        let url = self.url(&format!("instance/delete/{}", self.instance()));
        match self.http.delete(&url).header("apikey", &self.config.api_key).send().await {
            Ok(resp) => info!("[Evolution] Delete instance response [{}]", resp.status()),
            Err(e) => warn!("[Evolution] Delete instance failed: {}", e),
        }
    }

    async fn post_message(&self, endpoint: &str, body: Value) -> AppResult<()> {
        let url = self.url(&format!("message/{}/{}", endpoint, self.instance()));
        let resp = self.http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Client {
                status: status.as_u16(),
                message: safe_truncate(&text, 500).to_string(),
            });
        }
        Ok(())
    }

    async fn connection_state(&self) -> AppResult<Value> {
        let resp = self.http
            .get(self.url(&format!("instance/connectionState/{}", self.instance())))
            .header("apikey", &self.config.api_key)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::Client {
                status: status.as_u16(),
                message: safe_truncate(&text, 500).to_string(),
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    async fn emit(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            warn!("[Evolution] Event loop closed, dropping event");
        }
    }

    /// Report what a create/connect response says about the session: a QR
    /// challenge to scan, or an already paired session.
    async fn report_session(&self, resp: &Value) {
        if let Some(code) = extract_qr_code(resp) {
            self.emit(ClientEvent::Qr(code)).await;
            return;
        }

        let open = is_open(resp) || match self.connection_state().await {
            Ok(state) => is_open(&state),
            Err(e) => {
                warn!("[Evolution] Connection state check failed: {}", e);
                false
            }
        };

        if open {
            info!("[Evolution] Instance '{}' is already paired", self.config.instance_name);
            self.emit(ClientEvent::Authenticated).await;
            self.emit(ClientEvent::Ready).await;
        } else {
            info!("[Evolution] No QR code in response, waiting for webhook");
        }
    }
}

#[async_trait]
impl WhatsAppClient for EvolutionClient {
    async fn initialize(&self) -> AppResult<()> {
        if !self.config.persist_session {
            self.delete_instance().await;
        }

        let resp = match self.create_instance().await? {
            Some(resp) => resp,
            None => {
                info!("[Evolution] Instance '{}' exists, connecting", self.config.instance_name);
                self.connect_instance().await?
            }
        };

        self.report_session(&resp).await;
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> AppResult<()> {
        self.post_message("sendText", json!({
            "number": to_gateway_number(chat_id),
            "text": text,
        })).await
    }

    async fn send_buttons(&self, chat_id: &str, message: &ButtonMessage) -> AppResult<()> {
        let buttons: Vec<Value> = message.buttons.iter().map(|b| json!({
            "type": "reply",
            "displayText": b.text,
            "id": b.id,
        })).collect();

        self.post_message("sendButtons", json!({
            "number": to_gateway_number(chat_id),
            "title": message.title.clone().unwrap_or_default(),
            "description": message.body,
            "footer": message.footer.clone().unwrap_or_default(),
            "buttons": buttons,
        })).await
    }
}

/// The gateway addresses people by bare number; group ids keep their domain.
fn to_gateway_number(chat_id: &str) -> &str {
    if chat_id.ends_with("@g.us") {
        chat_id
    } else {
        strip_chat_suffix(chat_id)
    }
}

/// Duplicate instance name or token. v2 answers 403 `This name "x" is already in use.`
fn is_conflict(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("already") || lower.contains("in use") || lower.contains("exists")
}

/// `{"instance":{"state":"open"}}` (connect, connectionState) or `{"state":"open"}`.
fn is_open(resp: &Value) -> bool {
    let state = resp["instance"]["state"].as_str()
        .or_else(|| resp["state"].as_str())
        .unwrap_or("");
    matches!(state, "open" | "connected")
}

/// Pull the raw QR challenge string (not the rendered image) out of a
/// create/connect response.
pub(crate) fn extract_qr_code(resp: &Value) -> Option<String> {
    resp["qrcode"]["code"].as_str()
        .or_else(|| resp["code"].as_str())
        .or_else(|| resp["qrcode"].as_str().filter(|s| !s.starts_with("data:")))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
