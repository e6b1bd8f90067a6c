//! Error types for the streaming server.

/// Errors that can occur while serving the single client connection.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server loop hit a fatal I/O error.
    #[error("serve error: {0}")]
    Serve(String),

    /// A frame could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The WebSocket send failed; the client is gone.
    #[error("websocket send failed: {0}")]
    Send(String),
}
