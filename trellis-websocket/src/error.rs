//! Error types for WebSocket operations.

use thiserror::Error;
use trellis_http_client::HttpClientError;

/// WebSocket error type.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] tungstenite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Send error
    #[error("Failed to send message: {0}")]
    Send(String),

    /// Handshake timed out
    #[error("Operation timed out")]
    Timeout,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A socket agent is configured but no connector factory matches its
    /// scheme.
    #[error("Cannot resolve socket agent {agent:?}: {reason}")]
    UnresolvedAgent {
        /// The configured agent URL.
        agent: String,
        /// Resolution failure detail.
        reason: String,
    },

    /// Config or URL resolution failed before the handshake.
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

/// Result type for WebSocket operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;
