//! Error types for agent operations.

use minitown_world::WorldError;

/// Errors that can occur while creating or driving an agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// LLM-backed initialization could not produce a usable result.
    #[error("initialization failed for {name}: {reason}")]
    InitFailed {
        /// The agent that failed.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A schedule could not be loaded for this agent.
    #[error("schedule error for {name}: {source}")]
    Schedule {
        /// The agent that failed.
        name: String,
        /// The underlying world error.
        #[source]
        source: WorldError,
    },
}
