use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use shardlog_types::{
    ConversationId, ListField, ScanDirection, Shard, ShardKey, ShardOrdinal, Slot, SlotIndex,
    SlotUpdate, TombstoneFilter, ViewerId,
};

use crate::document;
use crate::error::{StoreError, StoreResult};
use crate::traits::{CreateMode, ShardStore, UpdateOutcome};

/// In-memory, ordered-map shard store.
///
/// Intended for tests and embedding. Shards live behind one `RwLock`; every
/// trait call takes the lock once, which makes each call atomic per
/// document. Keys order by conversation then numeric ordinal, so a
/// conversation's shards form one contiguous range of the map.
pub struct InMemoryShardStore {
    shards: RwLock<BTreeMap<ShardKey, Shard>>,
}

impl InMemoryShardStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of shards across all conversations.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove all shards.
    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<ShardKey, Shard>>> {
        self.shards
            .read()
            .map_err(|_| StoreError::Unavailable("shard map lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<ShardKey, Shard>>> {
        self.shards
            .write()
            .map_err(|_| StoreError::Unavailable("shard map lock poisoned".into()))
    }

    fn with_shard_mut<T>(&self, key: &ShardKey, f: impl FnOnce(&mut Shard) -> T) -> StoreResult<T> {
        let mut map = self.write()?;
        let shard = map
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(f(shard))
    }
}

fn conversation_range(conversation: &ConversationId) -> RangeInclusive<ShardKey> {
    ShardKey::new(conversation.clone(), ShardOrdinal(0))
        ..=ShardKey::new(conversation.clone(), ShardOrdinal(u64::MAX))
}

impl Default for InMemoryShardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardStore for InMemoryShardStore {
    async fn create(&self, shard: &Shard, mode: CreateMode) -> StoreResult<()> {
        let mut map = self.write()?;
        if mode == CreateMode::Insert && map.contains_key(&shard.shard_key) {
            return Err(StoreError::AlreadyExists(shard.shard_key.clone()));
        }
        map.insert(shard.shard_key.clone(), shard.clone());
        Ok(())
    }

    async fn find_by_key(&self, key: &ShardKey) -> StoreResult<Shard> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn find_by_ordinal(
        &self,
        conversation: &ConversationId,
        ordinal: u64,
        direction: ScanDirection,
    ) -> StoreResult<Shard> {
        let out_of_range = || StoreError::OrdinalOutOfRange {
            conversation: conversation.to_string(),
            ordinal,
        };
        let skip = usize::try_from(ordinal).map_err(|_| out_of_range())?;
        let map = self.read()?;
        let mut range = map.range(conversation_range(conversation));
        let found = match direction {
            ScanDirection::Ascending => range.nth(skip),
            ScanDirection::Descending => range.nth_back(skip),
        };
        found.map(|(_, shard)| shard.clone()).ok_or_else(out_of_range)
    }

    async fn count_shards(&self, conversation: &ConversationId) -> StoreResult<u64> {
        let map = self.read()?;
        Ok(map.range(conversation_range(conversation)).count() as u64)
    }

    async fn list_keys(&self, conversation: &ConversationId) -> StoreResult<Vec<ShardKey>> {
        let map = self.read()?;
        Ok(map
            .range(conversation_range(conversation))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn exists_by_key(&self, key: &ShardKey) -> StoreResult<bool> {
        Ok(self.read()?.contains_key(key))
    }

    async fn purge(&self, keys: &[ShardKey]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut map = self.write()?;
        Ok(keys.iter().filter(|key| map.remove(*key).is_some()).count() as u64)
    }

    async fn push_slots(&self, key: &ShardKey, slots: &[Slot]) -> StoreResult<usize> {
        self.with_shard_mut(key, |shard| document::push(shard, slots))
    }

    async fn update_slot(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        update: &SlotUpdate,
    ) -> StoreResult<UpdateOutcome> {
        self.with_shard_mut(key, |shard| document::update(shard, index, update))
    }

    async fn add_to_slot_list(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        field: ListField,
        values: &[ViewerId],
    ) -> StoreResult<UpdateOutcome> {
        self.with_shard_mut(key, |shard| document::add_to_list(shard, index, field, values))
    }

    async fn tombstone_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
    ) -> StoreResult<UpdateOutcome> {
        self.with_shard_mut(key, |shard| document::tombstone(shard, indexes))
    }

    async fn project_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
        filter: &TombstoneFilter,
    ) -> StoreResult<Vec<Option<Slot>>> {
        let map = self.read()?;
        let shard = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(document::project(shard, indexes, filter))
    }
}

impl std::fmt::Debug for InMemoryShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("InMemoryShardStore");
        match self.len() {
            Ok(count) => out.field("shard_count", &count),
            Err(_) => out.field("shard_count", &"<lock poisoned>"),
        };
        out.finish()
    }
}
