use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid sequence {0}: sequences start at 1")]
    InvalidSequence(u64),

    #[error("invalid shard capacity {0}: capacity must be positive")]
    InvalidCapacity(u64),

    #[error("conversation id must not be empty")]
    EmptyConversationId,

    #[error("malformed shard key {key:?}: {reason}")]
    MalformedShardKey { key: String, reason: String },

    #[error("unrecognized scan direction {0:?}")]
    InvalidDirection(String),

    #[error("slot {index} of shard {ordinal} is outside the address space at capacity {capacity}")]
    AddressOverflow { ordinal: u64, index: u64, capacity: u64 },
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
