//! Error types for the agent binary.
//!
//! [`AgentError`] covers start-up failures. Once the loop is running,
//! collaborator failures are reported through the planner's own error types
//! and never stop the process.

/// Top-level error for the agent binary.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: outpost_core::config::ConfigError,
    },

    /// Connecting to `Dragonfly` failed.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[from]
        source: outpost_db::DbError,
    },

    /// No controlling identity was configured.
    #[error("no identity configured: set identity.address or PLAYER_ADDRESS")]
    MissingIdentity,

    /// An HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(String),
}
