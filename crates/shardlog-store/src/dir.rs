//! Directory-backed shard store: one JSON document per shard.
//!
//! Layout under `{root}/{collection}/`:
//!
//! ```text
//! {hex(conversation)}.{ordinal}.json
//! ```
//!
//! Hex-encoding the conversation keeps arbitrary ids (including `/` and `:`)
//! out of the file system namespace and makes the `.` split unambiguous.
//! Documents are replaced atomically by writing a temp file in the same
//! directory and renaming it over the old one.
//!
//! The directory is listed once, on the first call that needs shard
//! ordinals; `create` and `purge` keep that index current afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use shardlog_types::{
    ConversationId, ListField, ScanDirection, Shard, ShardKey, ShardOrdinal, Slot, SlotIndex,
    SlotUpdate, TombstoneFilter, ViewerId,
};
use tracing::{debug, warn};

use crate::document;
use crate::error::{StoreError, StoreResult};
use crate::traits::{CreateMode, ShardStore, UpdateOutcome};

const EXTENSION: &str = "json";

/// File-backed [`ShardStore`] for single-process deployments and tooling.
///
/// Blocking file I/O runs on the tokio blocking pool. A process-wide mutex
/// serializes every read-modify-write, so each call is atomic per document
/// within this process. Not safe for several processes sharing one directory.
#[derive(Clone)]
pub struct DirShardStore {
    inner: Arc<DirInner>,
}

struct DirInner {
    dir: PathBuf,
    lock: Mutex<DirIndex>,
}

type OrdinalIndex = BTreeMap<ConversationId, BTreeSet<ShardOrdinal>>;

/// Guarded state of a directory store. `None` until first listed.
#[derive(Default)]
struct DirIndex {
    ordinals: Option<OrdinalIndex>,
}

impl DirShardStore {
    /// Open (or create) the collection directory `{root}/{collection}`.
    pub fn open(root: &Path, collection: &str) -> StoreResult<Self> {
        let dir = root.join(collection);
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened shard directory");
        Ok(Self {
            inner: Arc::new(DirInner {
                dir,
                lock: Mutex::new(DirIndex::default()),
            }),
        })
    }

    /// Directory holding the shard documents.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DirInner) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }

    async fn modify<T, F>(&self, key: &ShardKey, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Shard) -> T + Send + 'static,
    {
        let key = key.clone();
        self.run(move |inner| {
            let _guard = inner.guard()?;
            let mut shard = inner.load(&key)?;
            let out = f(&mut shard);
            inner.save(&shard)?;
            Ok(out)
        })
        .await
    }
}

impl DirInner {
    fn guard(&self) -> StoreResult<MutexGuard<'_, DirIndex>> {
        self.lock
            .lock()
            .map_err(|_| StoreError::Unavailable("shard directory lock poisoned".into()))
    }

    fn path_of(&self, key: &ShardKey) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{EXTENSION}",
            hex::encode(key.conversation().as_str()),
            key.ordinal()
        ))
    }

    fn load(&self, key: &ShardKey) -> StoreResult<Shard> {
        let path = self.path_of(key);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let shard: Shard = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?;
        if &shard.shard_key != key {
            return Err(StoreError::Serialization(format!(
                "{} holds shard {} instead of {key}",
                path.display(),
                shard.shard_key
            )));
        }
        Ok(shard)
    }

    fn save(&self, shard: &Shard) -> StoreResult<()> {
        let path = self.path_of(&shard.shard_key);
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, shard)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// The ordinal index, listing the directory on first use.
    fn index<'g>(&self, state: &'g mut DirIndex) -> StoreResult<&'g mut OrdinalIndex> {
        if state.ordinals.is_none() {
            state.ordinals = Some(self.list_dir()?);
        }
        Ok(state.ordinals.get_or_insert_with(BTreeMap::new))
    }

    /// Ordinals present for `conversation`, ascending.
    fn ordinals(
        &self,
        state: &mut DirIndex,
        conversation: &ConversationId,
    ) -> StoreResult<Vec<ShardOrdinal>> {
        Ok(self
            .index(state)?
            .get(conversation)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn list_dir(&self) -> StoreResult<OrdinalIndex> {
        let mut index = OrdinalIndex::new();
        let suffix = format!(".{EXTENSION}");
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&suffix) else { continue };
            match parse_stem(stem) {
                Some((conversation, ordinal)) => {
                    index.entry(conversation).or_default().insert(ordinal);
                }
                None => warn!(file = name, "skipping unrecognized file in shard directory"),
            }
        }
        debug!(dir = %self.dir.display(), conversations = index.len(), "indexed shard directory");
        Ok(index)
    }
}

/// Inverse of [`DirInner::path_of`] for a file stem `{hex}.{ordinal}`.
fn parse_stem(stem: &str) -> Option<(ConversationId, ShardOrdinal)> {
    let (conversation, ordinal) = stem.split_once('.')?;
    let conversation = String::from_utf8(hex::decode(conversation).ok()?).ok()?;
    let ordinal = ordinal.parse::<u64>().ok()?;
    Some((ConversationId::new(conversation).ok()?, ShardOrdinal(ordinal)))
}

#[async_trait]
impl ShardStore for DirShardStore {
    async fn create(&self, shard: &Shard, mode: CreateMode) -> StoreResult<()> {
        let shard = shard.clone();
        self.run(move |inner| {
            let mut guard = inner.guard()?;
            if mode == CreateMode::Insert && inner.path_of(&shard.shard_key).exists() {
                return Err(StoreError::AlreadyExists(shard.shard_key.clone()));
            }
            inner.save(&shard)?;
            inner
                .index(&mut guard)?
                .entry(shard.shard_key.conversation().clone())
                .or_default()
                .insert(shard.shard_key.ordinal());
            Ok(())
        })
        .await
    }

    async fn find_by_key(&self, key: &ShardKey) -> StoreResult<Shard> {
        let key = key.clone();
        self.run(move |inner| {
            let _guard = inner.guard()?;
            inner.load(&key)
        })
        .await
    }

    async fn find_by_ordinal(
        &self,
        conversation: &ConversationId,
        ordinal: u64,
        direction: ScanDirection,
    ) -> StoreResult<Shard> {
        let conversation = conversation.clone();
        self.run(move |inner| {
            let mut guard = inner.guard()?;
            let ordinals = inner.ordinals(&mut guard, &conversation)?;
            let picked = usize::try_from(ordinal).ok().and_then(|skip| match direction {
                ScanDirection::Ascending => ordinals.get(skip),
                ScanDirection::Descending => ordinals.iter().rev().nth(skip),
            });
            let ordinal_out_of_range = || StoreError::OrdinalOutOfRange {
                conversation: conversation.to_string(),
                ordinal,
            };
            let picked = *picked.ok_or_else(ordinal_out_of_range)?;
            inner.load(&ShardKey::new(conversation.clone(), picked))
        })
        .await
    }

    async fn count_shards(&self, conversation: &ConversationId) -> StoreResult<u64> {
        let conversation = conversation.clone();
        self.run(move |inner| {
            let mut guard = inner.guard()?;
            Ok(inner.ordinals(&mut guard, &conversation)?.len() as u64)
        })
        .await
    }

    async fn list_keys(&self, conversation: &ConversationId) -> StoreResult<Vec<ShardKey>> {
        let conversation = conversation.clone();
        self.run(move |inner| {
            let mut guard = inner.guard()?;
            Ok(inner
                .ordinals(&mut guard, &conversation)?
                .into_iter()
                .map(|o| ShardKey::new(conversation.clone(), o))
                .collect())
        })
        .await
    }

    async fn exists_by_key(&self, key: &ShardKey) -> StoreResult<bool> {
        let key = key.clone();
        self.run(move |inner| Ok(inner.path_of(&key).exists())).await
    }

    async fn purge(&self, keys: &[ShardKey]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys = keys.to_vec();
        self.run(move |inner| {
            let mut guard = inner.guard()?;
            let mut removed = 0;
            for key in &keys {
                match fs::remove_file(inner.path_of(key)) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                let index = inner.index(&mut guard)?;
                if let Some(set) = index.get_mut(key.conversation()) {
                    set.remove(&key.ordinal());
                    if set.is_empty() {
                        index.remove(key.conversation());
                    }
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn push_slots(&self, key: &ShardKey, slots: &[Slot]) -> StoreResult<usize> {
        let slots = slots.to_vec();
        self.modify(key, move |shard| document::push(shard, &slots)).await
    }

    async fn update_slot(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        update: &SlotUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let update = update.clone();
        self.modify(key, move |shard| document::update(shard, index, &update))
            .await
    }

    async fn add_to_slot_list(
        &self,
        key: &ShardKey,
        index: SlotIndex,
        field: ListField,
        values: &[ViewerId],
    ) -> StoreResult<UpdateOutcome> {
        let values = values.to_vec();
        self.modify(key, move |shard| {
            document::add_to_list(shard, index, field, &values)
        })
        .await
    }

    async fn tombstone_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
    ) -> StoreResult<UpdateOutcome> {
        let indexes = indexes.to_vec();
        self.modify(key, move |shard| document::tombstone(shard, &indexes))
            .await
    }

    async fn project_slots(
        &self,
        key: &ShardKey,
        indexes: &[SlotIndex],
        filter: &TombstoneFilter,
    ) -> StoreResult<Vec<Option<Slot>>> {
        let key = key.clone();
        let indexes = indexes.to_vec();
        let filter = filter.clone();
        self.run(move |inner| {
            let _guard = inner.guard()?;
            let shard = inner.load(&key)?;
            Ok(document::project(&shard, &indexes, &filter))
        })
        .await
    }
}

impl std::fmt::Debug for DirShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirShardStore")
            .field("dir", &self.inner.dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ShardKey {
        s.parse().unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, DirShardStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirShardStore::open(dir.path(), "msg").unwrap();
        (dir, store)
    }

    fn shard(k: &str, payloads: &[&[u8]]) -> Shard {
        Shard::with_slots(key(k), payloads.iter().map(|p| Slot::new(p.to_vec())).collect())
    }

    #[tokio::test]
    async fn create_persists_document() {
        let (dir, store) = temp_store();
        store.create(&shard("c1:0", &[b"a"]), CreateMode::Insert).await.unwrap();
        let file = dir.path().join("msg").join(format!("{}.0.json", hex::encode("c1")));
        assert!(file.exists());

        let reopened = DirShardStore::open(dir.path(), "msg").unwrap();
        let s = reopened.find_by_key(&key("c1:0")).await.unwrap();
        assert_eq!(s.msgs[0].payload.as_bytes(), Some(&b"a"[..]));
    }

    #[tokio::test]
    async fn insert_collision_fails() {
        let (_dir, store) = temp_store();
        store.create(&shard("c1:0", &[]), CreateMode::Insert).await.unwrap();
        let err = store.create(&shard("c1:0", &[]), CreateMode::Insert).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        store.create(&shard("c1:0", &[b"x"]), CreateMode::Upsert).await.unwrap();
        assert_eq!(store.find_by_key(&key("c1:0")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ordinals_sort_numerically_and_skip_other_conversations() {
        let (_dir, store) = temp_store();
        for k in ["c1:10", "c1:2", "c1:0", "c1x:0", "a/b:0"] {
            store.create(&shard(k, &[]), CreateMode::Insert).await.unwrap();
        }
        let c1 = ConversationId::new("c1").unwrap();
        let keys: Vec<String> = store
            .list_keys(&c1)
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, ["c1:0", "c1:2", "c1:10"]);

        let newest = store.find_by_ordinal(&c1, 0, ScanDirection::Descending).await.unwrap();
        assert_eq!(newest.shard_key, key("c1:10"));
        let err = store.find_by_ordinal(&c1, 3, ScanDirection::Ascending).await.unwrap_err();
        assert!(err.is_not_found());

        let slashed = ConversationId::new("a/b").unwrap();
        assert_eq!(store.count_shards(&slashed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let (dir, store) = temp_store();
        let k = key("c1:0");
        store.create(&shard("c1:0", &[b"1", b"2"]), CreateMode::Insert).await.unwrap();
        store.push_slots(&k, &[Slot::new(b"3".to_vec())]).await.unwrap();
        store.tombstone_slots(&k, &[0]).await.unwrap();
        store
            .add_to_slot_list(&k, 1, ListField::HideList, &[ViewerId::from("v")])
            .await
            .unwrap();
        store.update_slot(&k, 2, &SlotUpdate::SetStatus(7)).await.unwrap();

        let reopened = DirShardStore::open(dir.path(), "msg").unwrap();
        let s = reopened.find_by_key(&k).await.unwrap();
        assert_eq!(s.len(), 3);
        assert!(s.msgs[0].payload.is_tombstoned());
        assert_eq!(s.msgs[1].hide_list, vec![ViewerId::from("v")]);
        assert_eq!(s.msgs[2].status, 7);
    }

    #[tokio::test]
    async fn missing_shard_is_not_found_for_every_mutation() {
        let (_dir, store) = temp_store();
        let k = key("c1:0");
        assert!(store.push_slots(&k, &[]).await.unwrap_err().is_not_found());
        assert!(store.tombstone_slots(&k, &[0]).await.unwrap_err().is_not_found());
        assert!(store
            .project_slots(&k, &[0], &TombstoneFilter::any_viewer())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(!store.exists_by_key(&k).await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_files_idempotently() {
        let (_dir, store) = temp_store();
        store.create(&shard("c1:0", &[]), CreateMode::Insert).await.unwrap();
        assert_eq!(store.purge(&[key("c1:0"), key("c1:1")]).await.unwrap(), 1);
        assert_eq!(store.purge(&[key("c1:0")]).await.unwrap(), 0);
        assert!(!store.exists_by_key(&key("c1:0")).await.unwrap());
    }

    #[tokio::test]
    async fn ordinal_index_follows_create_and_purge() {
        let (dir, store) = temp_store();
        let c1 = ConversationId::new("c1").unwrap();
        for k in ["c1:0", "c1:1", "c1:2"] {
            store.create(&shard(k, &[b"x"]), CreateMode::Insert).await.unwrap();
        }
        assert_eq!(store.count_shards(&c1).await.unwrap(), 3);

        store.purge(&[key("c1:2")]).await.unwrap();
        assert_eq!(store.count_shards(&c1).await.unwrap(), 2);
        let newest = store.find_by_ordinal(&c1, 0, ScanDirection::Descending).await.unwrap();
        assert_eq!(newest.shard_key, key("c1:1"));

        store.create(&shard("c1:2", &[]), CreateMode::Insert).await.unwrap();
        assert_eq!(store.list_keys(&c1).await.unwrap().len(), 3);

        store.purge(&[key("c1:0"), key("c1:1"), key("c1:2")]).await.unwrap();
        assert_eq!(store.count_shards(&c1).await.unwrap(), 0);
        drop(store);

        let reopened = DirShardStore::open(dir.path(), "msg").unwrap();
        assert_eq!(reopened.count_shards(&c1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn index_is_built_from_existing_files_and_skips_strays() {
        let (dir, store) = temp_store();
        store.create(&shard("c1:0", &[b"a"]), CreateMode::Insert).await.unwrap();
        store.create(&shard("c1:4", &[b"b"]), CreateMode::Insert).await.unwrap();
        drop(store);
        let collection = dir.path().join("msg");
        fs::write(collection.join("notes.json"), "{}").unwrap();
        fs::write(collection.join(format!("{}.x.json", hex::encode("c1"))), "{}").unwrap();
        fs::write(collection.join("README"), "").unwrap();

        let reopened = DirShardStore::open(dir.path(), "msg").unwrap();
        let c1 = ConversationId::new("c1").unwrap();
        let keys: Vec<String> = reopened
            .list_keys(&c1)
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, ["c1:0", "c1:4"]);
    }
}
