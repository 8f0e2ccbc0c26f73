use shardlog_types::{ShardKey, TypeError};

/// Errors from shard store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested shard does not exist.
    #[error("shard not found: {0}")]
    NotFound(ShardKey),

    /// The conversation has no shard at the requested ordinal.
    #[error("conversation {conversation} has no shard at ordinal {ordinal}")]
    OrdinalOutOfRange { conversation: String, ordinal: u64 },

    /// Insert collided with an existing shard.
    #[error("shard already exists: {0}")]
    AlreadyExists(ShardKey),

    /// Malformed key, sequence, or direction.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] TypeError),

    /// The backing store cannot be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// `true` for both absent-key and absent-ordinal lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::OrdinalOutOfRange { .. }
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
