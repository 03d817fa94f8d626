//! Error types for the cache layer.

use std::time::Duration;

use thiserror::Error;

/// Cache layer errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Connection or protocol failure talking to the cache server.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// The call did not complete in time.
    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected a command.
    #[error("cache command failed: {0}")]
    Command(String),

    /// A reply did not have the shape the command promises.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// The command that was sent.
        command: &'static str,
        /// A rendering of what came back.
        reply: String,
    },
}

impl CacheError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            // The manager reports its own socket timeouts without a duration.
            return Self::Timeout(Duration::ZERO);
        }
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            return Self::Connection(err.to_string());
        }
        Self::Command(err.to_string())
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
