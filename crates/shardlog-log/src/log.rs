use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shardlog_store::{CreateMode, ShardStore, StoreResult, UpdateOutcome};
use shardlog_types::{
    AddressMapper, BatchEntry, ConversationId, FieldPath, ListField, MessageRecord, Payload,
    ScanDirection, Sequence, Shard, ShardKey, ShardOrdinal, Slot, SlotAddress, SlotField,
    SlotIndex, SlotUpdate, TombstoneFilter, ViewerId,
};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, LogConfig};
use crate::error::{LogError, LogResult, Operation};
use crate::scan::OrdinalScan;
use crate::traits::{LogReader, LogWriter};

/// The sharded message log over any [`ShardStore`].
///
/// Computes addresses with its [`AddressMapper`], wraps every store
/// round-trip in a deadline, and attaches operation context to failures.
/// Cheap to clone; clones share the store.
pub struct MessageLog<S: ShardStore + ?Sized> {
    store: Arc<S>,
    mapper: AddressMapper,
    timeout: Duration,
}

impl<S: ShardStore + ?Sized> Clone for MessageLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            mapper: self.mapper,
            timeout: self.timeout,
        }
    }
}

impl<S: ShardStore + ?Sized> MessageLog<S> {
    pub fn new(store: Arc<S>, mapper: AddressMapper, timeout: Duration) -> Self {
        Self {
            store,
            mapper,
            timeout,
        }
    }

    pub fn from_config(store: Arc<S>, config: &LogConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(store, config.mapper()?, config.op_timeout()))
    }

    /// A handle sharing this log's store whose calls use `timeout` as their
    /// deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn mapper(&self) -> &AddressMapper {
        &self.mapper
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn guarded<T>(
        &self,
        op: Operation,
        key: Option<&ShardKey>,
        call: impl Future<Output = StoreResult<T>>,
    ) -> LogResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| LogError::from_store(op, key, e)),
            Err(_) => Err(LogError::StoreUnavailable {
                op,
                key: key.map(ToString::to_string),
                reason: format!("deadline of {:?} exceeded", self.timeout),
            }),
        }
    }

    fn record(
        &self,
        op: Operation,
        key: &ShardKey,
        index: SlotIndex,
        slot: &Slot,
    ) -> LogResult<Option<MessageRecord>> {
        let Payload::Present(bytes) = &slot.payload else {
            return Ok(None);
        };
        let sequence = self
            .mapper
            .sequence_at(key.ordinal(), index)
            .map_err(|e| LogError::invalid(op, format!("shard {key}: {e}")))?;
        Ok(Some(MessageRecord {
            sequence,
            payload: bytes.clone(),
            status: slot.status,
        }))
    }

    /// Bounded scan for the first live slot in `direction`.
    async fn scan_live(
        &self,
        op: Operation,
        conversation: &ConversationId,
        direction: ScanDirection,
    ) -> LogResult<MessageRecord> {
        let count = self
            .guarded(op, None, self.store.count_shards(conversation))
            .await?;
        let limit = usize::try_from(self.mapper.capacity().get()).unwrap_or(usize::MAX);
        for skip in OrdinalScan::new(count) {
            let shard = match self
                .guarded(op, None, self.store.find_by_ordinal(conversation, skip, direction))
                .await
            {
                Ok(shard) => shard,
                // Shards were purged since the count; nothing further to scan.
                Err(e) if e.is_not_found() => break,
                Err(e) => return Err(e),
            };
            if shard.len() > limit {
                warn!(
                    shard_key = %shard.shard_key,
                    len = shard.len(),
                    capacity = limit,
                    "shard holds slots past capacity; scanning only addressable slots"
                );
            }
            if let Some((index, slot)) = shard.first_live_within(direction, limit) {
                if let Some(record) = self.record(op, &shard.shard_key, index, slot)? {
                    return Ok(record);
                }
            }
            debug!(op = %op, shard_key = %shard.shard_key, %direction, "no live slot; advancing");
        }
        Err(LogError::EmptyLog {
            conversation: conversation.to_string(),
        })
    }

    /// Payload correction at an exact address.
    pub async fn update_payload(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        payload: Vec<u8>,
    ) -> LogResult<UpdateOutcome> {
        self.set_slot_field(key, index, &SlotUpdate::SetPayload(Payload::Present(payload)))
            .await
    }

    /// Status transition at an exact address.
    pub async fn update_status(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        status: i32,
    ) -> LogResult<UpdateOutcome> {
        self.set_slot_field(key, index, &SlotUpdate::SetStatus(status))
            .await
    }

    /// Hide one message from `viewer` without tombstoning it for anyone else.
    pub async fn hide_for_viewer(
        &self,
        conversation: &ConversationId,
        sequence: Sequence,
        viewer: &ViewerId,
    ) -> LogResult<UpdateOutcome> {
        let addr = self.mapper.locate(conversation, sequence);
        self.add_unique_to_slot_list(
            &addr.key,
            addr.index,
            ListField::HideList,
            std::slice::from_ref(viewer),
        )
        .await
    }

    /// Append `slots` as sequences `first, first+1, ...`, splitting at shard
    /// boundaries and creating shards that do not exist yet. Returns the keys
    /// of the shards written, in order.
    ///
    /// `first` must be the conversation's next unwritten sequence. A new shard
    /// is only created at slot 0 and only after the shard before it exists;
    /// anything else is `InvalidArgument` and nothing is written for that
    /// chunk. A push into an existing shard that lands elsewhere is logged at
    /// `warn` but not rolled back.
    pub async fn append_sequenced(
        &self,
        conversation: &ConversationId,
        first: Sequence,
        slots: &[Slot],
    ) -> LogResult<Vec<ShardKey>> {
        let op = Operation::AppendSequenced;
        let capacity = self.mapper.capacity().get();
        let mut touched = Vec::new();
        let mut rest = slots;
        let mut next = first;

        while !rest.is_empty() {
            let addr = self.mapper.locate(conversation, next);
            let room = usize::try_from(capacity - addr.index as u64).unwrap_or(usize::MAX);
            let (chunk, tail) = rest.split_at(room.min(rest.len()));

            let exists = self
                .guarded(op, Some(&addr.key), self.store.exists_by_key(&addr.key))
                .await?;
            let len = if exists {
                self.guarded(op, Some(&addr.key), self.store.push_slots(&addr.key, chunk))
                    .await?
            } else {
                self.check_new_shard(&addr, touched.is_empty()).await?;
                let shard = Shard::with_slots(addr.key.clone(), chunk.to_vec());
                self.guarded(op, Some(&addr.key), self.store.create(&shard, CreateMode::Insert))
                    .await?;
                chunk.len()
            };

            if len != addr.index + chunk.len() {
                warn!(
                    shard_key = %addr.key,
                    expected_len = addr.index + chunk.len(),
                    actual_len = len,
                    first = %next,
                    "appended batch did not land at its mapped addresses"
                );
            }
            debug!(shard_key = %addr.key, count = chunk.len(), first = %next, "appended");
            touched.push(addr.key);

            rest = tail;
            if !rest.is_empty() {
                next = next
                    .checked_add(chunk.len() as u64)
                    .ok_or_else(|| LogError::invalid(op, "sequence space exhausted"))?;
            }
        }
        Ok(touched)
    }

    /// Preconditions for creating the shard at `addr`. `check_previous` is
    /// false when this call has just written the preceding shard.
    async fn check_new_shard(&self, addr: &SlotAddress, check_previous: bool) -> LogResult<()> {
        let op = Operation::AppendSequenced;
        if addr.index != 0 {
            return Err(LogError::invalid(
                op,
                format!(
                    "shard {} does not exist; cannot start it at slot {}",
                    addr.key, addr.index
                ),
            ));
        }
        if !check_previous || addr.key.ordinal().0 == 0 {
            return Ok(());
        }
        let previous = ShardKey::new(
            addr.key.conversation().clone(),
            ShardOrdinal(addr.key.ordinal().0 - 1),
        );
        let exists = self
            .guarded(op, Some(&previous), self.store.exists_by_key(&previous))
            .await?;
        if !exists {
            return Err(LogError::invalid(
                op,
                format!("shard {} cannot be created before shard {previous}", addr.key),
            ));
        }
        Ok(())
    }

    /// Tombstone messages by sequence across however many shards they span.
    ///
    /// One update per shard, in ascending shard order. A failure leaves
    /// earlier shards already tombstoned; retrying the whole call is safe.
    pub async fn tombstone_sequences(
        &self,
        conversation: &ConversationId,
        sequences: &[Sequence],
    ) -> LogResult<UpdateOutcome> {
        let mut total = UpdateOutcome::none();
        for (key, group) in self.mapper.partition(conversation, sequences) {
            let indexes: Vec<SlotIndex> = group.iter().map(|&s| self.mapper.index_of(s)).collect();
            let outcome = self
                .guarded(
                    Operation::TombstoneSequences,
                    Some(&key),
                    self.store.tombstone_slots(&key, &indexes),
                )
                .await?;
            total.matched += outcome.matched;
            total.modified += outcome.modified;
        }
        debug!(conversation = %conversation, matched = total.matched, modified = total.modified, "tombstoned sequences");
        Ok(total)
    }

    /// [`batch_by_sequences`](LogReader::batch_by_sequences) for sequences that
    /// may span several shards. Positions in shards that do not exist are
    /// `Absent`.
    pub async fn batch_across_shards(
        &self,
        conversation: &ConversationId,
        sequences: &[Sequence],
        viewer: &ViewerId,
    ) -> LogResult<Vec<BatchEntry>> {
        let mut out = vec![BatchEntry::Absent; sequences.len()];
        for (key, group) in self.mapper.partition(conversation, sequences) {
            let entries = match self
                .batch_by_sequences(conversation, &key, &group, viewer)
                .await
            {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                if let BatchEntry::Visible(record) = entry {
                    for (slot, seq) in out.iter_mut().zip(sequences) {
                        if *seq == record.sequence {
                            *slot = BatchEntry::Visible(record.clone());
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

fn field_path(key: &ShardKey, index: SlotIndex, field: Option<SlotField>) -> FieldPath {
    SlotAddress {
        key: key.clone(),
        index,
    }
    .field_path(field)
}

#[async_trait]
impl<S: ShardStore + ?Sized> LogWriter for MessageLog<S> {
    async fn create_shard(&self, shard: &Shard, mode: CreateMode) -> LogResult<()> {
        let key = &shard.shard_key;
        self.guarded(Operation::CreateShard, Some(key), self.store.create(shard, mode))
            .await?;
        debug!(shard_key = %key, slots = shard.len(), ?mode, "created shard");
        Ok(())
    }

    async fn append_to_shard(&self, key: &ShardKey, slots: &[Slot]) -> LogResult<usize> {
        let len = self
            .guarded(
                Operation::AppendToShard,
                Some(key),
                self.store.push_slots(key, slots),
            )
            .await?;
        debug!(shard_key = %key, count = slots.len(), len, "appended to shard");
        Ok(len)
    }

    async fn set_slot_field(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        update: &SlotUpdate,
    ) -> LogResult<UpdateOutcome> {
        let op = Operation::SetSlotField;
        let outcome = self
            .guarded(op, Some(key), self.store.update_slot(key, index, update))
            .await?;
        let path = field_path(key, index, update.field());
        if outcome.matched == 0 {
            warn!(shard_key = %key, %path, "update matched no slot; index outside populated range");
        } else {
            debug!(shard_key = %key, %path, modified = outcome.modified, "updated slot");
        }
        Ok(outcome)
    }

    async fn add_unique_to_slot_list(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        field: ListField,
        values: &[ViewerId],
    ) -> LogResult<UpdateOutcome> {
        let op = Operation::AddUniqueToSlotList;
        let outcome = self
            .guarded(op, Some(key), self.store.add_to_slot_list(key, index, field, values))
            .await?;
        let path = field_path(key, index, Some(field.into()));
        if outcome.matched == 0 {
            warn!(shard_key = %key, %path, "list append matched no slot; index outside populated range");
        } else {
            debug!(shard_key = %key, %path, modified = outcome.modified, "added to slot list");
        }
        Ok(outcome)
    }

    async fn tombstone_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
    ) -> LogResult<UpdateOutcome> {
        let outcome = self
            .guarded(
                Operation::TombstoneSlots,
                Some(key),
                self.store.tombstone_slots(key, indexes),
            )
            .await?;
        debug!(
            shard_key = %key,
            requested = indexes.len(),
            matched = outcome.matched,
            modified = outcome.modified,
            "tombstoned slots"
        );
        Ok(outcome)
    }

    async fn purge_shards(&self, keys: &[ShardKey]) -> LogResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self
            .guarded(Operation::PurgeShards, None, self.store.purge(keys))
            .await?;
        info!(requested = keys.len(), removed, "purged shards");
        Ok(removed)
    }
}

#[async_trait]
impl<S: ShardStore + ?Sized> LogReader for MessageLog<S> {
    async fn find_shard_by_key(&self, key: &ShardKey) -> LogResult<Shard> {
        self.guarded(Operation::FindShardByKey, Some(key), self.store.find_by_key(key))
            .await
    }

    async fn find_shard_by_ordinal(
        &self,
        conversation: &ConversationId,
        ordinal: u64,
        direction: ScanDirection,
    ) -> LogResult<Shard> {
        self.guarded(
            Operation::FindShardByOrdinal,
            None,
            self.store.find_by_ordinal(conversation, ordinal, direction),
        )
        .await
    }

    async fn exists_shard(&self, key: &ShardKey) -> LogResult<bool> {
        self.guarded(Operation::ExistsShard, Some(key), self.store.exists_by_key(key))
            .await
    }

    async fn batch_by_sequences(
        &self,
        conversation: &ConversationId,
        key: &ShardKey,
        sequences: &[Sequence],
        viewer: &ViewerId,
    ) -> LogResult<Vec<BatchEntry>> {
        let op = Operation::BatchBySequences;
        if !key.belongs_to(conversation) {
            return Err(LogError::invalid(
                op,
                format!("shard {key} does not belong to conversation {conversation}"),
            ));
        }
        let indexes = sequences
            .iter()
            .map(|&seq| {
                let addr = self.mapper.locate(conversation, seq);
                if &addr.key == key {
                    Ok(addr.index)
                } else {
                    Err(LogError::invalid(
                        op,
                        format!("sequence {seq} lives in shard {}, not {key}", addr.key),
                    ))
                }
            })
            .collect::<LogResult<Vec<_>>>()?;

        let filter = TombstoneFilter::for_viewer(viewer.clone());
        let slots = self
            .guarded(op, Some(key), self.store.project_slots(key, &indexes, &filter))
            .await?;

        let entries: Vec<BatchEntry> = sequences
            .iter()
            .zip(slots)
            .map(|(&sequence, slot)| match slot {
                Some(Slot {
                    payload: Payload::Present(payload),
                    status,
                    ..
                }) => BatchEntry::Visible(MessageRecord {
                    sequence,
                    payload,
                    status,
                }),
                Some(_) | None => BatchEntry::Absent,
            })
            .collect();
        debug!(
            shard_key = %key,
            requested = sequences.len(),
            visible = entries.iter().filter(|e| !e.is_absent()).count(),
            "batch read"
        );
        Ok(entries)
    }

    async fn newest(&self, conversation: &ConversationId) -> LogResult<MessageRecord> {
        self.scan_live(Operation::Newest, conversation, ScanDirection::Descending)
            .await
    }

    async fn oldest(&self, conversation: &ConversationId) -> LogResult<MessageRecord> {
        self.scan_live(Operation::Oldest, conversation, ScanDirection::Ascending)
            .await
    }
}

impl<S: ShardStore + ?Sized> std::fmt::Debug for MessageLog<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("capacity", &self.mapper.capacity().get())
            .field("timeout", &self.timeout)
            .finish()
    }
}
