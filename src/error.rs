use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing parameters: {0}")]
    MissingParams(String),

    #[error("WhatsApp client is not connected. Please try again later.")]
    NotConnected,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("QR error: {0}")]
    Qr(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingParams(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to HTTP callers. Upstream details stay in the server log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::MissingParams(msg) => msg.clone(),
            AppError::NotConnected => self.to_string(),
            AppError::Send(_) => "Failed to send message".to_string(),
            AppError::Qr(_) => "Error generating QR code".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), self.public_message()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
