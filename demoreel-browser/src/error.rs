//! Browser error types

use thiserror::Error;

/// Errors from the browser layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Chrome binary not found on this host.
    #[error("no chrome or chromium binary found")]
    ChromeNotFound,

    /// Chrome process failed to start or never announced its socket.
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    /// WebSocket connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The protocol returned an error for a command.
    #[error("cdp error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The underlying page or connection is gone.
    #[error("session closed")]
    SessionClosed,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for BrowserError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BrowserError::WebSocket(e.to_string())
    }
}
