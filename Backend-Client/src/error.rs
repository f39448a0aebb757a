use shell_bridge::BridgeError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors returned by backend client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket failure talking to the backend, with context.
    #[error("{context}: {source}")]
    Socket {
        context: String,
        source: tungstenite::Error,
    },

    /// Network-level HTTP request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The backend returned a non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A request to the privileged process failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation needs a live backend connection.
    #[error("Not connected to the backend")]
    NotConnected,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
