//! Foundation types for the sharded message log.
//!
//! Every other `shardlog` crate depends on these. Nothing here performs I/O.
//!
//! # Key Types
//!
//! - [`ConversationId`], [`ViewerId`], [`Sequence`] — identities and ordering
//! - [`ShardKey`] — `"{conversation}:{ordinal}"` identity of a shard document
//! - [`AddressMapper`] — `(conversation, sequence)` → [`SlotAddress`]
//! - [`Slot`] / [`Payload`] — one message position, live or tombstoned
//! - [`Shard`] — the bounded slot array
//! - [`TombstoneFilter`] — the visibility rule shared by all read paths

pub mod address;
pub mod direction;
pub mod error;
pub mod ids;
pub mod key;
pub mod shard;
pub mod slot;
pub mod visibility;

pub use address::{AddressMapper, Capacity, FieldPath, SlotAddress, DEFAULT_CAPACITY, MSG_COLLECTION};
pub use direction::ScanDirection;
pub use error::{TypeError, TypeResult};
pub use ids::{ConversationId, Sequence, ShardOrdinal, SlotIndex, ViewerId};
pub use key::ShardKey;
pub use shard::Shard;
pub use slot::{BatchEntry, ListField, MessageRecord, Payload, Slot, SlotField, SlotUpdate};
pub use visibility::TombstoneFilter;
