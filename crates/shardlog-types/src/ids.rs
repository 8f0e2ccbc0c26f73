use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Identifier of a conversation (a single chat, group, or channel log).
///
/// Opaque to the log apart from being non-empty. May contain `:`; shard keys
/// split on the last separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a conversation id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> TypeResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyConversationId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({})", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user reading the log. Used only for hide-list checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Per-conversation message sequence number. Always `>= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Sequence(u64);

impl Sequence {
    /// The first sequence of every conversation.
    pub const FIRST: Self = Self(1);

    pub fn new(value: u64) -> TypeResult<Self> {
        if value == 0 {
            return Err(TypeError::InvalidSequence(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The sequence `n` positions after this one, if it fits in `u64`.
    pub fn checked_add(self, n: u64) -> Option<Self> {
        self.0.checked_add(n).map(Self)
    }
}

impl TryFrom<u64> for Sequence {
    type Error = TypeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sequence> for u64 {
    fn from(seq: Sequence) -> Self {
        seq.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based position of a shard within its conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardOrdinal(pub u64);

impl fmt::Display for ShardOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based position of a slot inside a shard's slot array.
pub type SlotIndex = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_conversation_is_rejected() {
        assert_eq!(ConversationId::new(""), Err(TypeError::EmptyConversationId));
        assert!(ConversationId::new("si_a_b").is_ok());
    }

    #[test]
    fn conversation_serde_rejects_empty() {
        let parsed: Result<ConversationId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        let parsed: ConversationId = serde_json::from_str("\"g:team\"").unwrap();
        assert_eq!(parsed.as_str(), "g:team");
    }

    #[test]
    fn sequence_zero_is_invalid() {
        assert_eq!(Sequence::new(0), Err(TypeError::InvalidSequence(0)));
        assert_eq!(Sequence::new(1).unwrap(), Sequence::FIRST);
    }

    #[test]
    fn sequence_serde_validates() {
        assert!(serde_json::from_str::<Sequence>("0").is_err());
        let seq: Sequence = serde_json::from_str("42").unwrap();
        assert_eq!(seq.get(), 42);
        assert_eq!(serde_json::to_string(&seq).unwrap(), "42");
    }

    #[test]
    fn sequence_checked_add() {
        assert_eq!(Sequence::FIRST.checked_add(2).map(Sequence::get), Some(3));
        assert!(Sequence::new(u64::MAX).unwrap().checked_add(1).is_none());
    }

    #[test]
    fn viewer_serializes_as_plain_string() {
        let v = ViewerId::from("u1");
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"u1\"");
    }
}
