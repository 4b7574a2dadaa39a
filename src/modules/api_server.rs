//! Embedded HTTP API server with Swagger UI.
//!
//! Plain-text GET endpoints for liveness, the QR login page and message
//! sending, plus the webhook the WhatsApp gateway reports lifecycle events to.
//! Serves Swagger UI at /swagger-ui/.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use super::qr;
use super::session::{ClientEvent, ConnectionStatus, SessionSnapshot, SessionState};
use super::whatsapp::{format_chat_id, webhook, ButtonMessage, WhatsAppClient};
use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const MISSING_MESSAGE_PARAMS: &str = "Please provide both number and message";
const MISSING_BUTTON_PARAMS: &str = "Please provide number, body and buttons";
const QR_NOT_AVAILABLE: &str = "QR code is not available. Please wait...";

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

// ============================================================================
// OpenAPI Schema
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        root,
        ping,
        status,
        show_qr,
        send_message_query,
        send_message_path,
        send_button,
        whatsapp_webhook,
    ),
    components(schemas(StatusResponse, SessionSnapshot, ConnectionStatus)),
    tags(
        (name = "health", description = "Liveness and status"),
        (name = "session", description = "WhatsApp login"),
        (name = "messages", description = "Outbound messages"),
        (name = "webhook", description = "Gateway lifecycle events"),
    )
)]
struct ApiDoc;

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionState>,
    pub client: Arc<dyn WhatsAppClient>,
    pub events: mpsc::Sender<ClientEvent>,
    pub require_ready: bool,
    pub default_recipient: Option<String>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        session: Arc<SessionState>,
        client: Arc<dyn WhatsAppClient>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            session,
            client,
            events,
            require_ready: config.require_ready,
            default_recipient: config.default_recipient.clone(),
        }
    }

    fn ensure_ready(&self) -> AppResult<()> {
        if self.require_ready && !self.session.is_ready() {
            return Err(AppError::NotConnected);
        }
        Ok(())
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize, ToSchema)]
struct StatusResponse {
    session: SessionSnapshot,
    version: String,
    uptime_secs: u64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SendMessageQuery {
    /// Phone number with country code, digits only
    number: Option<String>,
    /// Message text
    message: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SendButtonQuery {
    /// Phone number; falls back to the configured default recipient
    number: Option<String>,
    /// Message body
    body: Option<String>,
    /// Comma-separated button labels
    buttons: Option<String>,
    title: Option<String>,
    footer: Option<String>,
}

/// Trimmed value, or `None` when missing or blank.
fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ============================================================================
// Endpoints
// ============================================================================

/// Liveness check
#[utoipa::path(
    get, path = "/",
    tag = "health",
    responses((status = 200, description = "Server is running", body = String, content_type = "text/plain"))
)]
async fn root() -> &'static str {
    "Server is running"
}

#[utoipa::path(
    get, path = "/ping",
    tag = "health",
    responses((status = 200, description = "Always `ping`", body = String, content_type = "text/plain"))
)]
async fn ping() -> &'static str {
    "ping"
}

/// Connection status and whether a QR challenge is pending
#[utoipa::path(
    get, path = "/status",
    tag = "health",
    responses((status = 200, description = "Session status", body = StatusResponse))
)]
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        session: state.session.snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: START_TIME.elapsed().as_secs(),
    })
}

/// HTML page with the current login QR code
#[utoipa::path(
    get, path = "/show-qr",
    tag = "session",
    responses(
        (status = 200, description = "QR page, or a not-available notice", body = String, content_type = "text/html"),
        (status = 500, description = "QR rendering failed", body = String, content_type = "text/plain"),
    )
)]
async fn show_qr(State(state): State<AppState>) -> Response {
    let Some(challenge) = state.session.challenge() else {
        return QR_NOT_AVAILABLE.into_response();
    };

    match qr::to_data_url(&challenge) {
        Ok(url) => Html(qr::qr_page(&url)).into_response(),
        Err(e) => {
            error!("[API] Error generating QR code: {}", e);
            e.into_response()
        }
    }
}

async fn deliver_text(state: &AppState, number: Option<String>, message: Option<String>) -> AppResult<String> {
    let (Some(number), Some(message)) = (required(number), required(message)) else {
        return Err(AppError::MissingParams(MISSING_MESSAGE_PARAMS.to_string()));
    };
    state.ensure_ready()?;

    let chat_id = format_chat_id(&number);
    match state.client.send_message(&chat_id, &message).await {
        Ok(()) => {
            info!("[API] Message sent to {}", number);
            Ok(format!("Message sent to {}", number))
        }
        Err(e) => {
            error!("[API] Failed to send message to {}: {}", number, e);
            Err(AppError::Send(e.to_string()))
        }
    }
}

/// Send a text message (query parameters)
#[utoipa::path(
    get, path = "/send-message",
    tag = "messages",
    params(SendMessageQuery),
    responses(
        (status = 200, description = "Message sent", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing number or message", body = String, content_type = "text/plain"),
        (status = 500, description = "Not connected or send failed", body = String, content_type = "text/plain"),
    )
)]
async fn send_message_query(
    State(state): State<AppState>,
    Query(q): Query<SendMessageQuery>,
) -> AppResult<String> {
    deliver_text(&state, q.number, q.message).await
}

/// Send a text message (path parameters, message is percent-decoded)
#[utoipa::path(
    get, path = "/send-message/{number}/{message}",
    tag = "messages",
    params(
        ("number" = String, Path, description = "Phone number with country code"),
        ("message" = String, Path, description = "Message text"),
    ),
    responses(
        (status = 200, description = "Message sent", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing number or message", body = String, content_type = "text/plain"),
        (status = 500, description = "Not connected or send failed", body = String, content_type = "text/plain"),
    )
)]
async fn send_message_path(
    State(state): State<AppState>,
    Path((number, message)): Path<(String, String)>,
) -> AppResult<String> {
    deliver_text(&state, Some(number), Some(message)).await
}

/// Send an interactive button message
#[utoipa::path(
    get, path = "/send-button",
    tag = "messages",
    params(SendButtonQuery),
    responses(
        (status = 200, description = "Button message sent", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing number, body or buttons", body = String, content_type = "text/plain"),
        (status = 500, description = "Not connected or send failed", body = String, content_type = "text/plain"),
    )
)]
async fn send_button(
    State(state): State<AppState>,
    Query(q): Query<SendButtonQuery>,
) -> AppResult<String> {
    let number = required(q.number).or_else(|| required(state.default_recipient.clone()));
    let (Some(number), Some(body)) = (number, required(q.body)) else {
        return Err(AppError::MissingParams(MISSING_BUTTON_PARAMS.to_string()));
    };

    let mut message = ButtonMessage::from_labels(&body, q.buttons.as_deref().unwrap_or(""));
    if message.buttons.is_empty() {
        return Err(AppError::MissingParams(MISSING_BUTTON_PARAMS.to_string()));
    }
    message.title = required(q.title);
    message.footer = required(q.footer);

    state.ensure_ready()?;

    match state.client.send_buttons(&format_chat_id(&number), &message).await {
        Ok(()) => {
            info!("[API] Button message sent to {} ({} buttons)", number, message.buttons.len());
            Ok(format!("Button message sent to {}", number))
        }
        Err(e) => {
            error!("[API] Failed to send button message to {}: {}", number, e);
            Err(AppError::Send(e.to_string()))
        }
    }
}

/// Lifecycle webhook posted by the WhatsApp gateway. Always acknowledged.
#[utoipa::path(
    post, path = "/webhook/whatsapp",
    tag = "webhook",
    request_body(content = String, description = "Gateway event JSON", content_type = "application/json"),
    responses((status = 200, description = "Acknowledged", body = String, content_type = "text/plain"))
)]
async fn whatsapp_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!("[Webhook] Ignoring non-JSON body: {}", e);
            return (StatusCode::OK, "OK");
        }
    };

    for event in webhook::parse_webhook(&payload) {
        if state.events.send(event).await.is_err() {
            warn!("[Webhook] Event loop closed, dropping event");
            break;
        }
    }
    (StatusCode::OK, "OK")
}

// ============================================================================
// Server Startup
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Lazy::force(&START_TIME);

    Router::new()
        // Health
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/status", get(status))
        // Session
        .route("/show-qr", get(show_qr))
        // Messages
        .route("/send-message", get(send_message_query))
        .route("/send-message/{number}/{message}", get(send_message_path))
        .route("/send-button", get(send_button))
        // Gateway webhook
        .route("/webhook/whatsapp", post(whatsapp_webhook))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // CORS
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the server fails.
pub async fn serve(addr: &str, state: AppState) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Server is running on http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui/", addr);

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::whatsapp::mock::MockClient;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Harness {
        session: Arc<SessionState>,
        client: Arc<MockClient>,
        rx: mpsc::Receiver<ClientEvent>,
        app: Router,
    }

    fn harness_with(client: MockClient, config: AppConfig) -> Harness {
        let session = Arc::new(SessionState::new());
        let client = Arc::new(client);
        let (tx, rx) = mpsc::channel(16);
        let state = AppState::new(&config, session.clone(), client.clone(), tx);
        Harness { session, client, rx, app: build_router(state) }
    }

    fn harness() -> Harness {
        harness_with(MockClient::default(), AppConfig::new())
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, String) {
        let req = Request::builder().method(method).uri(uri).body(body).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        call(app, "GET", uri, Body::empty()).await
    }

    #[tokio::test]
    async fn test_liveness() {
        let h = harness();
        assert_eq!(get(&h.app, "/").await, (StatusCode::OK, "Server is running".to_string()));
        assert_eq!(get(&h.app, "/ping").await, (StatusCode::OK, "ping".to_string()));
    }

    #[tokio::test]
    async fn test_show_qr_before_challenge() {
        let h = harness();
        assert_eq!(get(&h.app, "/show-qr").await, (StatusCode::OK, QR_NOT_AVAILABLE.to_string()));
    }

    #[tokio::test]
    async fn test_show_qr_embeds_challenge_until_cleared() {
        let h = harness();
        h.session.set_challenge("2@abc,def==,ghi==,1");
        let expected = qr::to_data_url("2@abc,def==,ghi==,1").unwrap();

        let (status, first) = get(&h.app, "/show-qr").await;
        assert_eq!(status, StatusCode::OK);
        assert!(first.contains(&expected));

        let (_, second) = get(&h.app, "/show-qr").await;
        assert_eq!(first, second);

        h.session.clear_challenge();
        assert_eq!(get(&h.app, "/show-qr").await.1, QR_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_send_message_path_success() {
        let h = harness();
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-message/15550001234/Hello%20World").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message sent to 15550001234");
        assert_eq!(h.client.sent(), vec![("15550001234@c.us".to_string(), "Hello World".to_string())]);
    }

    #[tokio::test]
    async fn test_send_message_query_success() {
        let h = harness();
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-message?number=15550001234&message=hi%20there").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message sent to 15550001234");
        assert_eq!(h.client.sent()[0].1, "hi there");
    }

    #[tokio::test]
    async fn test_send_message_missing_params() {
        let h = harness();
        h.session.set_status(ConnectionStatus::Ready);

        for uri in [
            "/send-message",
            "/send-message?number=15550001234",
            "/send-message?message=hello",
            "/send-message?number=&message=hello",
            "/send-message?number=15550001234&message=%20%20",
            "/send-message/15550001234/%20",
        ] {
            let (status, body) = get(&h.app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body, MISSING_MESSAGE_PARAMS);
        }
        assert!(h.client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_failure() {
        let h = harness_with(MockClient::failing(), AppConfig::new());
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-message/15550001234/Hello").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to send message");
    }

    #[tokio::test]
    async fn test_send_message_not_connected() {
        let h = harness();

        let (status, body) = get(&h.app, "/send-message/15550001234/Hello").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "WhatsApp client is not connected. Please try again later.");
        assert!(h.client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_ready_check() {
        let mut config = AppConfig::new();
        config.require_ready = false;
        let h = harness_with(MockClient::default(), config);

        let (status, _) = get(&h.app, "/send-message/15550001234/Hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_button() {
        let h = harness();
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-button?number=15550001234&body=Pick&buttons=Yes,No&footer=thanks").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Button message sent to 15550001234");
        let sent = h.client.sent_buttons.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15550001234@c.us");
        assert_eq!(sent[0].1.buttons.len(), 2);
        assert_eq!(sent[0].1.footer.as_deref(), Some("thanks"));
        assert_eq!(sent[0].1.title, None);
    }

    #[tokio::test]
    async fn test_send_button_requires_number_without_default() {
        let h = harness();
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-button?body=Pick&buttons=Yes").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, MISSING_BUTTON_PARAMS);

        let (status, _) = get(&h.app, "/send-button?number=1555&body=Pick&buttons=%20,").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.client.sent_buttons.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_button_default_recipient() {
        let mut config = AppConfig::new();
        config.default_recipient = Some("15557776666".into());
        let h = harness_with(MockClient::default(), config);
        h.session.set_status(ConnectionStatus::Ready);

        let (status, body) = get(&h.app, "/send-button?body=Pick&buttons=Yes").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Button message sent to 15557776666");
    }

    #[tokio::test]
    async fn test_status_json() {
        let h = harness();
        h.session.set_challenge("2@abc");

        let (status, body) = get(&h.app, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["session"]["status"], "disconnected");
        assert_eq!(json["session"]["has_qr"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_webhook_forwards_events() {
        let mut h = harness();
        let payload = r#"{"event":"qrcode.updated","data":{"qrcode":{"code":"2@hook"}}}"#;

        let (status, body) = call(&h.app, "POST", "/webhook/whatsapp", Body::from(payload)).await;

        assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));
        assert_eq!(h.rx.recv().await, Some(ClientEvent::Qr("2@hook".into())));
    }

    #[tokio::test]
    async fn test_webhook_accepts_garbage() {
        let mut h = harness();
        let (status, _) = call(&h.app, "POST", "/webhook/whatsapp", Body::from("not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.rx.try_recv().is_err());
    }
}
