//! Deterministic mapping from `(conversation, sequence)` to a slot address.
//!
//! Sequence `s` lives in shard `⌊(s−1)/C⌋` at slot `(s−1) mod C`, where `C`
//! is the shard capacity. No counter or index service is consulted; any
//! message can be updated in O(1) from its sequence alone.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::ids::{ConversationId, Sequence, ShardOrdinal, SlotIndex};
use crate::key::ShardKey;
use crate::slot::SlotField;

/// Default number of slots per shard.
pub const DEFAULT_CAPACITY: u64 = 5000;

/// Name of the collection holding shard documents.
pub const MSG_COLLECTION: &str = "msg";

/// Number of slots a shard holds. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Capacity(u64);

impl Capacity {
    pub fn new(slots: u64) -> TypeResult<Self> {
        if slots == 0 {
            return Err(TypeError::InvalidCapacity(slots));
        }
        Ok(Self(slots))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self(DEFAULT_CAPACITY)
    }
}

impl TryFrom<u64> for Capacity {
    type Error = TypeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for u64 {
    fn from(c: Capacity) -> Self {
        c.0
    }
}

/// Exact location of one message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotAddress {
    pub key: ShardKey,
    pub index: SlotIndex,
}

impl SlotAddress {
    /// Typed path of the slot (or one of its fields) inside the shard document.
    pub fn field_path(&self, field: Option<SlotField>) -> FieldPath {
        FieldPath {
            collection: MSG_COLLECTION,
            key: self.key.clone(),
            index: self.index,
            field,
        }
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.index)
    }
}

/// A field path into a stored shard document.
///
/// Renders as `msgs.{index}` for a whole slot and `msgs.{index}.{field}` for a
/// single field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub collection: &'static str,
    pub key: ShardKey,
    pub index: SlotIndex,
    pub field: Option<SlotField>,
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "msgs.{}.{}", self.index, field),
            None => write!(f, "msgs.{}", self.index),
        }
    }
}

/// Pure address computation for a given shard capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressMapper {
    capacity: Capacity,
}

impl AddressMapper {
    pub fn new(capacity: Capacity) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn ordinal_of(&self, sequence: Sequence) -> ShardOrdinal {
        ShardOrdinal((sequence.get() - 1) / self.capacity.get())
    }

    pub fn index_of(&self, sequence: Sequence) -> SlotIndex {
        // Always below capacity.
        ((sequence.get() - 1) % self.capacity.get()) as SlotIndex
    }

    pub fn locate(&self, conversation: &ConversationId, sequence: Sequence) -> SlotAddress {
        SlotAddress {
            key: ShardKey::new(conversation.clone(), self.ordinal_of(sequence)),
            index: self.index_of(sequence),
        }
    }

    /// [`locate`](Self::locate) for an unvalidated raw sequence.
    pub fn locate_raw(&self, conversation: &ConversationId, sequence: u64) -> TypeResult<SlotAddress> {
        Ok(self.locate(conversation, Sequence::new(sequence)?))
    }

    pub fn shard_key(&self, conversation: &ConversationId, sequence: Sequence) -> ShardKey {
        ShardKey::new(conversation.clone(), self.ordinal_of(sequence))
    }

    /// Inverse mapping: the sequence stored at `index` of shard `ordinal`.
    pub fn sequence_at(&self, ordinal: ShardOrdinal, index: SlotIndex) -> TypeResult<Sequence> {
        let cap = self.capacity.get();
        let index = index as u64;
        let overflow = || TypeError::AddressOverflow {
            ordinal: ordinal.0,
            index,
            capacity: cap,
        };
        if index >= cap {
            return Err(overflow());
        }
        let zero_based = ordinal
            .0
            .checked_mul(cap)
            .and_then(|base| base.checked_add(index))
            .ok_or_else(overflow)?;
        Sequence::new(zero_based.checked_add(1).ok_or_else(overflow)?)
    }

    /// First sequence held by shard `ordinal`.
    pub fn first_sequence(&self, ordinal: ShardOrdinal) -> TypeResult<Sequence> {
        self.sequence_at(ordinal, 0)
    }

    /// Group sequences by the shard holding them, keeping input order inside
    /// each group. Groups iterate in ascending shard order.
    pub fn partition(
        &self,
        conversation: &ConversationId,
        sequences: &[Sequence],
    ) -> BTreeMap<ShardKey, Vec<Sequence>> {
        let mut groups: BTreeMap<ShardKey, Vec<Sequence>> = BTreeMap::new();
        for &seq in sequences {
            groups
                .entry(self.shard_key(conversation, seq))
                .or_default()
                .push(seq);
        }
        groups
    }
}
