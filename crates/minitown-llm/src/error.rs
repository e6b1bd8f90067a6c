//! Error types for the LLM crate.
//!
//! These errors stay internal to the crate: the high-level [`api`]
//! functions catch them and return the caller's default value instead.
//!
//! [`api`]: crate::api

/// Errors that can occur while talking to the generation endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request failed or the stream broke mid-response.
    #[error("request error: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, best effort.
        body: String,
    },

    /// The per-call timeout elapsed before the `done` flag arrived.
    #[error("generation timed out after {0} seconds")]
    Timeout(u64),

    /// No endpoint is configured (offline mode).
    #[error("client is offline")]
    Offline,

    /// The prompt key has no registered template.
    #[error("unknown prompt key: {0}")]
    UnknownPrompt(String),
}
