//! Evolution API webhook payloads → `ClientEvent`s.
//!
//! Event names arrive either dotted (`qrcode.updated`, v1) or as upper snake
//! case (`QRCODE_UPDATED`, v2); both are accepted.

use serde_json::Value;
use tracing::debug;

use super::evolution::extract_qr_code;
use super::strip_chat_suffix;
use crate::modules::session::{ClientEvent, InboundMessage};

/// Status reason the gateway reports when the phone rejected or revoked the pairing.
const STATUS_UNAUTHORIZED: i64 = 401;

fn normalize_event_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', ".")
}

pub fn parse_webhook(payload: &Value) -> Vec<ClientEvent> {
    let event = normalize_event_name(payload["event"].as_str().unwrap_or(""));
    let data = &payload["data"];

    match event.as_str() {
        "qrcode.updated" => extract_qr_code(data).map(ClientEvent::Qr).into_iter().collect(),
        "connection.update" => parse_connection_update(data),
        "logout.instance" => vec![ClientEvent::Disconnected("logout".to_string())],
        "messages.upsert" => parse_messages(data).into_iter().map(ClientEvent::MessageReceived).collect(),
        other => {
            debug!("[Webhook] Ignoring event '{}'", other);
            Vec::new()
        }
    }
}

fn parse_connection_update(data: &Value) -> Vec<ClientEvent> {
    let state = data["state"].as_str().unwrap_or("");
    match state {
        "open" | "connected" => vec![ClientEvent::Authenticated, ClientEvent::Ready],
        "close" | "closed" => {
            let reason = data["statusReason"].as_i64();
            if reason == Some(STATUS_UNAUTHORIZED) {
                vec![ClientEvent::AuthFailure("pairing rejected (401)".to_string())]
            } else {
                let reason = reason.map(|r| format!("connection closed ({})", r))
                    .unwrap_or_else(|| "connection closed".to_string());
                vec![ClientEvent::Disconnected(reason)]
            }
        }
        _ => Vec::new(),
    }
}

fn parse_messages(data: &Value) -> Vec<InboundMessage> {
    let messages = match data.as_array() {
        Some(arr) => arr.iter().collect::<Vec<_>>(),
        None => vec![data],
    };

    messages.into_iter().filter_map(|msg| {
        let key = &msg["key"];
        if key["fromMe"].as_bool().unwrap_or(false) {
            return None;
        }

        let body = msg["message"]["conversation"].as_str()
            .or_else(|| msg["message"]["extendedTextMessage"]["text"].as_str())
            .unwrap_or("");
        if body.is_empty() {
            return None;
        }

        let chat_id = key["remoteJid"].as_str().unwrap_or("");
        if chat_id.is_empty() {
            return None;
        }
        let sender = key["participant"].as_str().unwrap_or(chat_id);

        Some(InboundMessage {
            id: key["id"].as_str().unwrap_or("").to_string(),
            from: strip_chat_suffix(sender).to_string(),
            chat_id: chat_id.to_string(),
            push_name: msg["pushName"].as_str().map(str::to_string),
            body: body.to_string(),
        })
    }).collect()
}
