use async_trait::async_trait;
use shardlog_store::{CreateMode, UpdateOutcome};
use shardlog_types::{
    BatchEntry, ConversationId, ListField, MessageRecord, ScanDirection, Sequence, Shard, ShardKey,
    Slot, SlotIndex, SlotUpdate, ViewerId,
};

use crate::error::LogResult;

/// Write boundary of the message log.
///
/// Exactly one logical writer per conversation is assumed; this trait does
/// not coordinate concurrent writers of the same conversation.
#[async_trait]
pub trait LogWriter: Send + Sync {
    async fn create_shard(&self, shard: &Shard, mode: CreateMode) -> LogResult<()>;

    /// Append `slots` in order to the shard. The caller guarantees they belong
    /// at the next unfilled positions; the store does not check. Returns the
    /// new slot count.
    async fn append_to_shard(&self, key: &ShardKey, slots: &[Slot]) -> LogResult<usize>;

    /// Targeted write at an exact address. An index past the populated range
    /// matches nothing (`matched == 0`) and is not an error.
    async fn set_slot_field(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        update: &SlotUpdate,
    ) -> LogResult<UpdateOutcome>;

    /// Set-union append into a list field. Re-adding a present value is a no-op.
    async fn add_unique_to_slot_list(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        field: ListField,
        values: &[ViewerId],
    ) -> LogResult<UpdateOutcome>;

    /// Tombstone the listed slots of one shard in a single update.
    async fn tombstone_slots(&self, key: &ShardKey, indexes: &[SlotIndex])
        -> LogResult<UpdateOutcome>;

    /// Retention cleanup. Returns the number of shards removed.
    async fn purge_shards(&self, keys: &[ShardKey]) -> LogResult<u64>;
}

/// Read boundary of the message log.
#[async_trait]
pub trait LogReader: Send + Sync {
    async fn find_shard_by_key(&self, key: &ShardKey) -> LogResult<Shard>;

    async fn find_shard_by_ordinal(
        &self,
        conversation: &ConversationId,
        ordinal: u64,
        direction: ScanDirection,
    ) -> LogResult<Shard>;

    async fn exists_shard(&self, key: &ShardKey) -> LogResult<bool>;

    /// Point-read `sequences` from one shard as seen by `viewer`.
    ///
    /// The result is aligned with `sequences`; tombstoned, hidden, and
    /// unpopulated positions are [`BatchEntry::Absent`].
    async fn batch_by_sequences(
        &self,
        conversation: &ConversationId,
        key: &ShardKey,
        sequences: &[Sequence],
        viewer: &ViewerId,
    ) -> LogResult<Vec<BatchEntry>>;

    /// Latest live message. `EmptyLog` when there is none.
    async fn newest(&self, conversation: &ConversationId) -> LogResult<MessageRecord>;

    /// Earliest live message. `EmptyLog` when there is none.
    async fn oldest(&self, conversation: &ConversationId) -> LogResult<MessageRecord>;
}
