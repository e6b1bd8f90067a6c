//! Error types for the simulation engine.

use minitown_agents::AgentError;

/// Errors that abort a simulation run before or during the tick loop.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The `start_simulation` parameters are unusable.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// An agent failed to initialize.
    #[error("agent setup failed: {source}")]
    AgentSetup {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// The connected client went away; frames can no longer be delivered.
    #[error("client disconnected")]
    ClientGone,
}
