//! Error types for the confsync client.

use thiserror::Error;

/// Errors that can occur when using the confsync client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Client configuration is unusable (empty app id, empty or invalid server list).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single server could not be reached.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// HTTP request failed.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered the full pull with something other than 200.
    #[error("Server {server} answered with status {status}")]
    Status {
        /// Base URL of the server that answered.
        server: String,
        /// HTTP status code.
        status: u16,
    },

    /// Payload or push frame could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// WebSocket handshake or I/O failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Every configured server was tried and none succeeded.
    #[error("All {attempted} servers failed")]
    AllServersFailed {
        /// Number of servers tried.
        attempted: usize,
    },

    /// Local cache file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Protocol(e.to_string())
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
