//! Error types for the OME book client

use thiserror::Error;

/// OME client errors
#[derive(Error, Debug)]
pub enum OmeError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Fixed-point value {0} does not fit a decimal")]
    FixedPointOverflow(String),

    #[error("REST API error: {0}")]
    RestApiError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Indexer query error: {0}")]
    GraphError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Unexpected action: {0}")]
    UnexpectedAction(String),

    #[error("Margin arithmetic overflow: {0}")]
    MarginOverflow(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for OmeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        OmeError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for OmeError {
    fn from(err: serde_json::Error) -> Self {
        OmeError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for OmeError {
    fn from(err: reqwest::Error) -> Self {
        OmeError::RestApiError(err.to_string())
    }
}

impl From<std::io::Error> for OmeError {
    fn from(err: std::io::Error) -> Self {
        OmeError::IpcError(err.to_string())
    }
}

impl From<prometheus::Error> for OmeError {
    fn from(err: prometheus::Error) -> Self {
        OmeError::MetricsError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OmeError>;
