//! Swarm client error types.
//!
//! Errors returned to the caller come from exactly four surfaces:
//! session creation, `send`, `join`, and `close`. Everything the server
//! streams at us mid-session (parse failures, server error documents,
//! unexpected disconnects) is reported through listener callbacks
//! instead, via [`crate::protocol::StreamError`]; the read loop never
//! propagates an error across the task boundary.

use thiserror::Error;

/// Swarm client errors.
#[derive(Error, Debug)]
pub enum SwarmError {
    /// The stream handshake could not be completed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Protocol-level error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation requires a live connection and the lazy reconnect
    /// attempt also failed.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The session has been closed; no further operations are possible.
    #[error("Session closed")]
    Closed,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for swarm client operations.
pub type Result<T> = std::result::Result<T, SwarmError>;

impl From<toml::de::Error> for SwarmError {
    fn from(err: toml::de::Error) -> Self {
        SwarmError::Config(err.to_string())
    }
}
