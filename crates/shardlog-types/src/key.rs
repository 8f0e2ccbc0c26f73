use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{ConversationId, ShardOrdinal};

/// Separator between the conversation id and the shard ordinal.
pub const KEY_SEPARATOR: char = ':';

/// Identity of one shard document: `"{conversation}:{ordinal}"`.
///
/// Ordering is by conversation, then numeric ordinal, so `c1:2` sorts before
/// `c1:10` and all shards of one conversation are contiguous.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShardKey {
    conversation: ConversationId,
    ordinal: ShardOrdinal,
}

impl ShardKey {
    pub fn new(conversation: ConversationId, ordinal: ShardOrdinal) -> Self {
        Self {
            conversation,
            ordinal,
        }
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn ordinal(&self) -> ShardOrdinal {
        self.ordinal
    }

    /// Key of the shard following this one in the same conversation.
    pub fn next(&self) -> Option<Self> {
        self.ordinal.0.checked_add(1).map(|o| Self {
            conversation: self.conversation.clone(),
            ordinal: ShardOrdinal(o),
        })
    }

    /// Returns `true` if the key belongs to `conversation`.
    pub fn belongs_to(&self, conversation: &ConversationId) -> bool {
        &self.conversation == conversation
    }
}

impl FromStr for ShardKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| TypeError::MalformedShardKey {
            key: s.to_owned(),
            reason: reason.to_owned(),
        };
        let (conversation, ordinal) = s
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| malformed("missing ':' separator"))?;
        let conversation =
            ConversationId::new(conversation).map_err(|_| malformed("empty conversation id"))?;
        if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("ordinal is not a decimal integer"));
        }
        if ordinal.len() > 1 && ordinal.starts_with('0') {
            return Err(malformed("ordinal has leading zeros"));
        }
        let ordinal = ordinal
            .parse::<u64>()
            .map_err(|e| malformed(&e.to_string()))?;
        Ok(Self::new(conversation, ShardOrdinal(ordinal)))
    }
}

impl TryFrom<String> for ShardKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShardKey> for String {
    fn from(key: ShardKey) -> Self {
        key.to_string()
    }
}

impl fmt::Debug for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardKey({self})")
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.conversation, self.ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ShardKey {
        s.parse().unwrap()
    }

    #[test]
    fn display_and_parse_agree() {
        let k = ShardKey::new(ConversationId::new("c1").unwrap(), ShardOrdinal(0));
        assert_eq!(k.to_string(), "c1:0");
        assert_eq!(key("c1:0"), k);
    }

    #[test]
    fn text_form_round_trips() {
        for text in ["c1:0", "c1:7", "c1:10", "sg:team:42"] {
            assert_eq!(key(text).to_string(), text);
        }
    }

    #[test]
    fn conversation_may_contain_separator() {
        let k = key("sg:team:42");
        assert_eq!(k.conversation().as_str(), "sg:team");
        assert_eq!(k.ordinal(), ShardOrdinal(42));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for bad in [
            "",
            "c1",
            ":0",
            "c1:",
            "c1:x",
            "c1:-1",
            "c1:+3",
            "c1:99999999999999999999",
            "c1:007",
            "c1:00",
        ] {
            assert!(
                matches!(bad.parse::<ShardKey>(), Err(TypeError::MalformedShardKey { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn ordering_is_numeric_within_conversation() {
        assert!(key("c1:2") < key("c1:10"));
        assert!(key("c1:10") < key("c2:0"));
    }

    #[test]
    fn next_advances_ordinal() {
        assert_eq!(key("c1:4").next(), Some(key("c1:5")));
        assert_eq!(ShardKey::new(ConversationId::new("c").unwrap(), ShardOrdinal(u64::MAX)).next(), None);
    }

    #[test]
    fn serde_uses_text_form() {
        let k = key("c1:3");
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"c1:3\"");
        let parsed: ShardKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, k);
        assert!(serde_json::from_str::<ShardKey>("\"nope\"").is_err());
    }
}
