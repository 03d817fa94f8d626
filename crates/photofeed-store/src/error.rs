//! Error types for photofeed storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored key could not be decoded.
    #[error("corrupt key in {cf}: {reason}")]
    CorruptKey {
        /// Column family holding the key.
        cf: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
}

impl StoreError {
    /// Whether retrying the same operation later could succeed.
    ///
    /// Missing records and undecodable data stay that way; database failures are usually
    /// transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
