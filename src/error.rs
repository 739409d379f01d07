use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Failure to decode one envelope, record or delta. Never fatal to ingestion:
/// callers drop the offending unit and continue with the batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid JSON: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("malformed {entity_type} record: {source}")]
    MalformedRecord {
        entity_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("delta is missing entityType or changeType")]
    UnknownUpdateType,

    #[error("invalid {entity_type} delta {id}: {reason}")]
    InvalidUpdateFormat {
        entity_type: String,
        id: String,
        reason: String,
    },
}

/// A store state that the protocol can never legitimately produce.
#[derive(Debug, Error)]
#[error("store invariant violated: {0}")]
pub struct InvariantViolation(pub String);
