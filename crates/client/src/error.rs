//! Error types for the session client.

use std::time::Duration;

use crate::config::ConfigError;

/// Socket-level failure. Absorbed by the connection lifecycle; never handed to
/// feature code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session task has shut down; the handle is stale.
    #[error("session is closed")]
    Closed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
