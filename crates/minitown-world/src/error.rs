//! Error types for world data loading.

/// Errors that can occur while loading world data.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The schedule file could not be read.
    #[error("failed to read schedule file {path}: {source}")]
    ScheduleIo {
        /// Path that was attempted.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The schedule file is not valid JSON of the expected shape.
    #[error("failed to parse schedule file {path}: {source}")]
    ScheduleParse {
        /// Path that was attempted.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The schedule file has no entry for the requested agent.
    #[error("no schedule entry for agent {0}")]
    UnknownAgent(String),

    /// The schedule entry exists but holds no usable items.
    #[error("schedule for agent {0} is empty")]
    EmptySchedule(String),
}
