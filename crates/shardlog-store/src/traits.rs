use async_trait::async_trait;
use shardlog_types::{
    ConversationId, ListField, ScanDirection, Shard, ShardKey, Slot, SlotIndex, SlotUpdate,
    TombstoneFilter, ViewerId,
};

use crate::error::StoreResult;

/// How [`ShardStore::create`] treats an existing key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with `AlreadyExists` on collision.
    #[default]
    Insert,
    /// Replace any existing shard.
    Upsert,
}

/// Slot counts touched by an in-place update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Addressed slots that exist in the populated range.
    pub matched: u64,
    /// Matched slots whose stored value actually changed.
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.modified == 0
    }
}

/// Document store of bounded shards.
///
/// All implementations must satisfy these invariants:
/// - Every call touching one shard is atomic for that shard: concurrent
///   callers observe either none or all of its effect.
/// - `push_slots` appends against the true array length at execution time.
/// - Slots are never removed from their array position. Only `purge`
///   removes data, and it removes whole shards.
/// - In-place updates addressing an index beyond the populated range match
///   nothing and change nothing; that is not an error.
/// - Shards of a conversation are enumerated in numeric ordinal order.
#[async_trait]
pub trait ShardStore: Send + Sync {
    /// Insert a new shard.
    async fn create(&self, shard: &Shard, mode: CreateMode) -> StoreResult<()>;

    /// Fetch a shard. `NotFound` when absent.
    async fn find_by_key(&self, key: &ShardKey) -> StoreResult<Shard>;

    /// Fetch the `ordinal`-th shard (zero-based) of `conversation` in the given
    /// order. `OrdinalOutOfRange` when the conversation has fewer shards.
    async fn find_by_ordinal(
        &self,
        conversation: &ConversationId,
        ordinal: u64,
        direction: ScanDirection,
    ) -> StoreResult<Shard>;

    /// Number of shards the conversation currently has.
    async fn count_shards(&self, conversation: &ConversationId) -> StoreResult<u64>;

    /// Shard keys of `conversation`, ascending.
    async fn list_keys(&self, conversation: &ConversationId) -> StoreResult<Vec<ShardKey>>;

    async fn exists_by_key(&self, key: &ShardKey) -> StoreResult<bool>;

    /// Delete the named shards. Absent keys are skipped. Returns how many
    /// shards were removed.
    async fn purge(&self, keys: &[ShardKey]) -> StoreResult<u64>;

    /// Append `slots` in order to the end of the shard's slot array.
    /// Returns the new array length. `NotFound` when the shard is absent.
    async fn push_slots(&self, key: &ShardKey, slots: &[Slot]) -> StoreResult<usize>;

    /// Write one field (or the whole slot) at `index`.
    async fn update_slot(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        update: &SlotUpdate,
    ) -> StoreResult<UpdateOutcome>;

    /// Set-union `values` into a list field of the slot at `index`.
    async fn add_to_slot_list(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        field: ListField,
        values: &[ViewerId],
    ) -> StoreResult<UpdateOutcome>;

    /// Tombstone every listed slot in one document update.
    async fn tombstone_slots(&self, key: &ShardKey, indexes: &[SlotIndex])
        -> StoreResult<UpdateOutcome>;

    /// Server-side projection of the slots at `indexes`.
    ///
    /// Position `i` of the result is `Some` with the hide-list stripped when
    /// `indexes[i]` is populated and admitted by `filter`, `None` otherwise.
    /// `NotFound` when the shard is absent.
    async fn project_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
        filter: &TombstoneFilter,
    ) -> StoreResult<Vec<Option<Slot>>>;
}
