use std::fmt;

use shardlog_store::StoreError;
use shardlog_types::ShardKey;

/// Log operations, named as they appear in error context and traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateShard,
    AppendToShard,
    AppendSequenced,
    SetSlotField,
    AddUniqueToSlotList,
    TombstoneSlots,
    TombstoneSequences,
    FindShardByKey,
    FindShardByOrdinal,
    BatchBySequences,
    Newest,
    Oldest,
    PurgeShards,
    ExistsShard,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateShard => "create_shard",
            Operation::AppendToShard => "append_to_shard",
            Operation::AppendSequenced => "append_sequenced",
            Operation::SetSlotField => "set_slot_field",
            Operation::AddUniqueToSlotList => "add_unique_to_slot_list",
            Operation::TombstoneSlots => "tombstone_slots",
            Operation::TombstoneSequences => "tombstone_sequences",
            Operation::FindShardByKey => "find_shard_by_key",
            Operation::FindShardByOrdinal => "find_shard_by_ordinal",
            Operation::BatchBySequences => "batch_by_sequences",
            Operation::Newest => "newest",
            Operation::Oldest => "oldest",
            Operation::PurgeShards => "purge_shards",
            Operation::ExistsShard => "exists_shard",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    StoreUnavailable,
    EmptyLog,
}

/// Errors produced by log operations.
///
/// Every store-originated error carries the operation and, where one applies,
/// the shard key it was working on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("{op}: {target} not found")]
    NotFound { op: Operation, target: String },

    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: Operation, reason: String },

    #[error("{op}: shard {key} already exists")]
    AlreadyExists { op: Operation, key: String },

    #[error("{op} [{}]: store unavailable: {reason}", key.as_deref().unwrap_or("-"))]
    StoreUnavailable {
        op: Operation,
        key: Option<String>,
        reason: String,
    },

    /// The conversation has no live message in any shard. A normal state for
    /// a new conversation.
    #[error("conversation {conversation} has no live messages")]
    EmptyLog { conversation: String },
}

impl LogError {
    pub(crate) fn from_store(op: Operation, key: Option<&ShardKey>, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(k) => LogError::NotFound {
                op,
                target: format!("shard {k}"),
            },
            StoreError::OrdinalOutOfRange {
                conversation,
                ordinal,
            } => LogError::NotFound {
                op,
                target: format!("shard ordinal {ordinal} of {conversation}"),
            },
            StoreError::AlreadyExists(k) => LogError::AlreadyExists {
                op,
                key: k.to_string(),
            },
            StoreError::InvalidArgument(e) => LogError::InvalidArgument {
                op,
                reason: e.to_string(),
            },
            other @ (StoreError::Unavailable(_)
            | StoreError::Serialization(_)
            | StoreError::Io(_)) => LogError::StoreUnavailable {
                op,
                key: key.map(ToString::to_string),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn invalid(op: Operation, reason: impl Into<String>) -> Self {
        LogError::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LogError::NotFound { .. } => ErrorKind::NotFound,
            LogError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            LogError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            LogError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            LogError::EmptyLog { .. } => ErrorKind::EmptyLog,
        }
    }

    pub fn is_empty_log(&self) -> bool {
        self.kind() == ErrorKind::EmptyLog
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The failing operation, if the error came from one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            LogError::NotFound { op, .. }
            | LogError::InvalidArgument { op, .. }
            | LogError::AlreadyExists { op, .. }
            | LogError::StoreUnavailable { op, .. } => Some(*op),
            LogError::EmptyLog { .. } => None,
        }
    }
}

/// Result alias for log operations.
pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shardlog_types::TypeError;

    fn key() -> ShardKey {
        "c1:0".parse().unwrap()
    }

    #[test]
    fn store_errors_keep_operation_and_key() {
        let err = LogError::from_store(
            Operation::SetSlotField,
            Some(&key()),
            StoreError::Unavailable("connection reset".into()),
        );
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert_eq!(err.operation(), Some(Operation::SetSlotField));
        let msg = err.to_string();
        assert!(msg.contains("set_slot_field"));
        assert!(msg.contains("c1:0"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn ordinal_out_of_range_is_not_found() {
        let err = LogError::from_store(
            Operation::FindShardByOrdinal,
            None,
            StoreError::OrdinalOutOfRange {
                conversation: "c1".into(),
                ordinal: 4,
            },
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ordinal 4"));
    }

    #[test]
    fn type_errors_become_invalid_argument() {
        let err = LogError::from_store(
            Operation::CreateShard,
            None,
            StoreError::InvalidArgument(TypeError::InvalidSequence(0)),
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn empty_log_has_no_operation() {
        let err = LogError::EmptyLog {
            conversation: "c1".into(),
        };
        assert!(err.is_empty_log());
        assert_eq!(err.operation(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_key_renders_placeholder() {
        let err = LogError::StoreUnavailable {
            op: Operation::Newest,
            key: None,
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "newest [-]: store unavailable: timeout");
    }
}
