// World store facade: path resolution, the node working set, durability.
//
// Module overview: `WorldStore` ties the pieces together. The traversal
// graph turns paths into stable keys; each resolved key gets a slot in
// the working set holding that node's entity table and voxel chunks
// behind a `RwLock`; the disk layer persists slots as checksummed node
// files. Handles (`NodeHandle`) are cheap `Arc` clones of a slot, so
// every resolution of a node observes the same state.
//
// Locking: the graph and the working-set map each sit behind their own
// mutex, held for lookups and slot bookkeeping. A node's disk load
// happens under its own write lock with neither mutex held; mutations
// take the write lock, reads the read lock. Flush encodes under the
// read lock so writers are paused per node while its snapshot is taken,
// and nothing blocks operations on other nodes. The one exception is
// eviction, which flushes its victim while still holding the
// working-set mutex: selection and removal have to be atomic or a
// concurrent resolve could re-pin the slot between them.
//
// Eviction keeps the working set near `cache_nodes`: least-recently-used
// slots that no handle holds are flushed (when dirty) and dropped. A
// slot pinned by a live handle is never evicted, so the cap is soft.
//
// See also: `entity.rs` and `voxel.rs` for per-node state, `disk.rs` for
// the file formats, `config.rs` for the options.
//
// **Critical constraint: flush is all-or-nothing per node.** A node is
// either rewritten completely (serialize, temp file, rename) or its
// previous file survives untouched; a failed node stays dirty in memory
// and is retried by the next flush.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};
use warren_graph::{Graph, NodeKey, Path, Vertex};
use warren_wire::ComponentTag;

use crate::archetype::{Archetype, EntityId};
use crate::config::{CharacterRecord, DEFAULT_CHUNK_SIZE, UnknownComponents, WorldMeta, WorldOptions};
use crate::disk::{self, WorldDisk};
use crate::entity::{EntityNode, Query};
use crate::error::StoreError;
use crate::voxel::VoxelNode;

/// One cached node. Shared between the working set and any number of
/// handles; the state lock is what serializes access.
#[derive(Debug)]
struct NodeSlot {
    key: NodeKey,
    dirty: AtomicBool,
    /// Logical timestamp of the last resolution, for LRU eviction.
    last_used: AtomicU64,
    /// Serializes concurrent flushes of this one node.
    flushing: Mutex<()>,
    state: RwLock<SlotState>,
}

#[derive(Debug)]
struct SlotState {
    /// False until the node's file has been read (or found absent). A
    /// failed load leaves this false so the next resolve retries.
    loaded: bool,
    entities: EntityNode,
    voxels: VoxelNode,
}

impl NodeSlot {
    fn new(key: NodeKey) -> NodeSlot {
        NodeSlot {
            key,
            dirty: AtomicBool::new(false),
            last_used: AtomicU64::new(0),
            flushing: Mutex::new(()),
            state: RwLock::new(SlotState {
                loaded: false,
                entities: EntityNode::new(),
                voxels: VoxelNode::new(),
            }),
        }
    }
}

#[derive(Debug)]
struct WorkingSet {
    map: FxHashMap<NodeKey, Arc<NodeSlot>>,
    /// Monotonic resolution counter feeding `NodeSlot::last_used`.
    clock: u64,
}

#[derive(Debug)]
struct CharacterTable {
    records: BTreeMap<String, CharacterRecord>,
    dirty: bool,
}

/// Counts reported by [`WorldStore::stats`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreStats {
    /// Nodes materialized in the traversal graph this session.
    pub graph_nodes: usize,
    /// Nodes currently held in the working set.
    pub cached_nodes: usize,
    /// Cached nodes with unflushed changes.
    pub dirty_nodes: usize,
    pub characters: usize,
}

/// Outcome of [`WorldStore::verify`].
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Node files examined.
    pub checked: usize,
    /// Files that failed to decode, with the reason each.
    pub corrupt: Vec<(NodeKey, StoreError)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// A persistent world: graph-addressed nodes of entities and voxel
/// chunks, plus named character records.
#[derive(Debug)]
pub struct WorldStore {
    meta: WorldMeta,
    options: WorldOptions,
    disk: WorldDisk,
    graph: Mutex<Graph>,
    slots: Mutex<WorkingSet>,
    characters: Mutex<CharacterTable>,
}

impl WorldStore {
    /// Opens (creating if absent) the world at `root` with default options.
    pub fn open(root: impl AsRef<std::path::Path>) -> Result<WorldStore, StoreError> {
        WorldStore::open_with(root, WorldOptions::default())
    }

    /// Opens (creating if absent) the world at `root`.
    ///
    /// For an existing world, `options.chunk_size` of `Some` asserts the
    /// on-disk value and fails with `MetaMismatch` when they disagree;
    /// `None` accepts whatever the world was created with.
    pub fn open_with(
        root: impl AsRef<std::path::Path>,
        options: WorldOptions,
    ) -> Result<WorldStore, StoreError> {
        if options.chunk_size == Some(0) {
            return Err(StoreError::InvalidOptions("chunk_size must be at least 1"));
        }
        if options.cache_nodes == 0 {
            return Err(StoreError::InvalidOptions("cache_nodes must be at least 1"));
        }
        let disk = WorldDisk::open(root.as_ref())?;
        let meta = match disk.load_meta()? {
            Some(on_disk) => {
                if let Some(requested) = options.chunk_size {
                    if requested != on_disk.chunk_size {
                        return Err(StoreError::MetaMismatch {
                            on_disk: on_disk.chunk_size,
                            requested,
                        });
                    }
                }
                on_disk
            }
            None => {
                let meta = WorldMeta::new(options.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE));
                disk.store_meta(&meta)?;
                info!(chunk_size = meta.chunk_size, "created world");
                meta
            }
        };
        let records = disk.load_characters()?;
        info!(
            root = %disk.root().display(),
            chunk_size = meta.chunk_size,
            characters = records.len(),
            "opened world"
        );
        Ok(WorldStore {
            meta,
            options,
            disk,
            graph: Mutex::new(Graph::new()),
            slots: Mutex::new(WorkingSet { map: FxHashMap::default(), clock: 0 }),
            characters: Mutex::new(CharacterTable { records, dirty: false }),
        })
    }

    /// Immutable parameters of this world.
    pub fn meta(&self) -> WorldMeta {
        self.meta
    }

    /// Resolves a traversal path to a node handle, loading the node's
    /// persisted state on first touch. Resolving the same node twice
    /// yields handles sharing one state.
    pub fn resolve(&self, path: &Path) -> Result<NodeHandle, StoreError> {
        let key = {
            let mut graph = self.graph.lock();
            let node = graph.resolve(path);
            graph.key(node)
        };
        self.handle_for(key)
    }

    /// [`resolve`](WorldStore::resolve) from raw edge indices, validating
    /// them first.
    pub fn resolve_indices(&self, indices: &[u8]) -> Result<NodeHandle, StoreError> {
        let path = Path::from_indices(indices)?;
        self.resolve(&path)
    }

    fn handle_for(&self, key: NodeKey) -> Result<NodeHandle, StoreError> {
        let slot = {
            let mut set = self.slots.lock();
            set.clock += 1;
            let clock = set.clock;
            let slot = set
                .map
                .entry(key)
                .or_insert_with(|| Arc::new(NodeSlot::new(key)))
                .clone();
            slot.last_used.store(clock, Ordering::Relaxed);
            self.evict_over_capacity(&mut set);
            slot
        };
        self.ensure_loaded(&slot)?;
        Ok(NodeHandle { slot, chunk_len: self.meta.chunk_byte_len() })
    }

    /// Reads the node's file into the slot if it has not been read yet.
    /// On failure the slot stays unloaded and the error is returned; a
    /// later resolve retries.
    fn ensure_loaded(&self, slot: &NodeSlot) -> Result<(), StoreError> {
        {
            let state = slot.state.read();
            if state.loaded {
                return Ok(());
            }
        }
        let mut state = slot.state.write();
        if state.loaded {
            return Ok(());
        }
        match self.disk.load_node(slot.key)? {
            Some(bytes) => {
                let (entities, voxels) =
                    disk::decode_node(&bytes, &self.meta, self.options.unknown_components)
                        .map_err(|source| StoreError::CorruptNode { key: slot.key, source })?;
                debug!(key = %slot.key, bytes = bytes.len(), entities = entities.entity_count(), "loaded node");
                state.entities = entities;
                state.voxels = voxels;
            }
            None => debug!(key = %slot.key, "resolved new node"),
        }
        state.loaded = true;
        Ok(())
    }

    /// Shrinks the working set back toward `cache_nodes`. Runs with the
    /// working-set lock held; candidates are slots no handle references.
    fn evict_over_capacity(&self, set: &mut WorkingSet) {
        while set.map.len() > self.options.cache_nodes {
            let mut victim: Option<(u64, NodeKey)> = None;
            for (key, slot) in &set.map {
                if Arc::strong_count(slot) > 1 {
                    continue;
                }
                let used = slot.last_used.load(Ordering::Relaxed);
                if victim.is_none_or(|(best, _)| used < best) {
                    victim = Some((used, *key));
                }
            }
            // Every slot is pinned by a handle; the cap is soft.
            let Some((_, key)) = victim else { break };
            let Some(slot) = set.map.get(&key).cloned() else { break };
            if slot.dirty.load(Ordering::Acquire) {
                if let Err(err) = self.flush_slot(&slot) {
                    warn!(key = %key, error = %err, "eviction flush failed; keeping node cached");
                    break;
                }
            }
            set.map.remove(&key);
            debug!(key = %key, "evicted node");
        }
    }

    /// Persists one slot if dirty. The read lock is held across encode
    /// and store so the written file is a consistent snapshot, and the
    /// dirty flag is cleared before the lock drops so a writer queued
    /// behind us re-dirties correctly.
    fn flush_slot(&self, slot: &NodeSlot) -> Result<bool, StoreError> {
        let _flushing = slot.flushing.lock();
        let state = slot.state.read();
        if !slot.dirty.load(Ordering::Acquire) {
            return Ok(false);
        }
        let bytes = disk::encode_node(&state.entities, &state.voxels);
        self.disk.store_node(slot.key, &bytes)?;
        slot.dirty.store(false, Ordering::Release);
        debug!(key = %slot.key, bytes = bytes.len(), "stored node");
        Ok(true)
    }

    /// Persists every dirty node and the character records.
    ///
    /// All dirty nodes are attempted even when some fail; the first
    /// failure is returned after the sweep. Returns the number of nodes
    /// written.
    pub fn flush(&self) -> Result<usize, StoreError> {
        let dirty: Vec<Arc<NodeSlot>> = {
            let set = self.slots.lock();
            set.map
                .values()
                .filter(|slot| slot.dirty.load(Ordering::Acquire))
                .cloned()
                .collect()
        };
        let results: Vec<(NodeKey, Result<bool, StoreError>)> = dirty
            .par_iter()
            .map(|slot| (slot.key, self.flush_slot(slot)))
            .collect();

        let mut flushed = 0;
        let mut first_error = None;
        for (key, result) in results {
            match result {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "flush failed for node");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Err(err) = self.flush_characters() {
            warn!(error = %err, "flush failed for character records");
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(nodes = flushed, "flushed world");
                Ok(flushed)
            }
        }
    }

    fn flush_characters(&self) -> Result<(), StoreError> {
        let mut table = self.characters.lock();
        if !table.dirty {
            return Ok(());
        }
        self.disk.store_characters(&table.records)?;
        table.dirty = false;
        Ok(())
    }

    /// Flushes and consumes the store. Equivalent to `flush` followed by
    /// drop, but a clean close never logs the unflushed-changes warning.
    pub fn close(self) -> Result<(), StoreError> {
        self.flush()?;
        Ok(())
    }

    /// Records where a named character lives. The record's path is
    /// validated; persisted on the next flush.
    pub fn put_character(&self, name: &str, record: CharacterRecord) -> Result<(), StoreError> {
        Path::from_indices(&record.path)?;
        let mut table = self.characters.lock();
        table.records.insert(name.to_owned(), record);
        table.dirty = true;
        Ok(())
    }

    pub fn get_character(&self, name: &str) -> Option<CharacterRecord> {
        self.characters.lock().records.get(name).cloned()
    }

    /// Removes a character record. Returns whether one existed.
    pub fn remove_character(&self, name: &str) -> bool {
        let mut table = self.characters.lock();
        let removed = table.records.remove(name).is_some();
        if removed {
            table.dirty = true;
        }
        removed
    }

    /// All character names, sorted.
    pub fn character_names(&self) -> Vec<String> {
        self.characters.lock().records.keys().cloned().collect()
    }

    /// Resolves a character's home node and returns it with the
    /// character's entity ID there.
    pub fn resolve_character(&self, name: &str) -> Result<Option<(NodeHandle, EntityId)>, StoreError> {
        let Some(record) = self.get_character(name) else {
            return Ok(None);
        };
        let handle = self.resolve_indices(&record.path)?;
        Ok(Some((handle, record.entity)))
    }

    /// Session counters.
    pub fn stats(&self) -> StoreStats {
        let graph_nodes = self.graph.lock().node_count();
        let (cached_nodes, dirty_nodes) = {
            let set = self.slots.lock();
            let dirty = set
                .map
                .values()
                .filter(|slot| slot.dirty.load(Ordering::Acquire))
                .count();
            (set.map.len(), dirty)
        };
        let characters = self.characters.lock().records.len();
        StoreStats { graph_nodes, cached_nodes, dirty_nodes, characters }
    }

    /// Keys of every node persisted on disk, sorted.
    pub fn stored_node_keys(&self) -> Result<Vec<NodeKey>, StoreError> {
        Ok(self.disk.node_keys()?)
    }

    /// Decodes every node file on disk without touching the working set,
    /// reporting the ones that fail. Unknown component tags are always
    /// tolerated here; verify audits structure, not policy.
    pub fn verify(&self) -> Result<VerifyReport, StoreError> {
        let keys = self.disk.node_keys()?;
        let corrupt: Vec<(NodeKey, StoreError)> = keys
            .par_iter()
            .filter_map(|&key| self.verify_node(key).err().map(|err| (key, err)))
            .collect();
        Ok(VerifyReport { checked: keys.len(), corrupt })
    }

    fn verify_node(&self, key: NodeKey) -> Result<(), StoreError> {
        if let Some(bytes) = self.disk.load_node(key)? {
            disk::decode_node(&bytes, &self.meta, UnknownComponents::Preserve)
                .map_err(|source| StoreError::CorruptNode { key, source })?;
        }
        Ok(())
    }
}

impl Drop for WorldStore {
    fn drop(&mut self) {
        let dirty_nodes = {
            let set = self.slots.lock();
            set.map
                .values()
                .filter(|slot| slot.dirty.load(Ordering::Acquire))
                .count()
        };
        let dirty_characters = self.characters.lock().dirty;
        if dirty_nodes > 0 || dirty_characters {
            warn!(dirty_nodes, "dropping world store with unflushed changes");
        }
    }
}

/// Handle to one resolved node. Clones share the node's state; drop all
/// handles to make the node evictable again.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    slot: Arc<NodeSlot>,
    chunk_len: usize,
}

impl NodeHandle {
    /// Stable structural key of this node, identical across sessions.
    pub fn key(&self) -> NodeKey {
        self.slot.key
    }

    /// True when this node has changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.slot.dirty.load(Ordering::Acquire)
    }

    /// Takes the node's read lock for a batch of consistent reads.
    ///
    /// Drop the guard before calling this handle's mutating operations
    /// from the same thread; the lock is not reentrant.
    pub fn read(&self) -> NodeGuard<'_> {
        NodeGuard { state: self.slot.state.read() }
    }

    /// Inserts a new entity with the given components.
    pub fn insert_entity(
        &self,
        entity: EntityId,
        components: &[(ComponentTag, &[u8])],
    ) -> Result<(), StoreError> {
        let mut state = self.slot.state.write();
        state.entities.insert(entity, components)?;
        trace!(key = %self.slot.key, %entity, "inserted entity");
        self.slot.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Removes an entity and all its components.
    pub fn remove_entity(&self, entity: EntityId) -> Result<(), StoreError> {
        let mut state = self.slot.state.write();
        state.entities.remove(entity)?;
        trace!(key = %self.slot.key, %entity, "removed entity");
        self.slot.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Sets one component, migrating the entity between archetypes when
    /// its component set changes.
    pub fn set_component(
        &self,
        entity: EntityId,
        tag: ComponentTag,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        let mut state = self.slot.state.write();
        state.entities.set_component(entity, tag, payload)?;
        trace!(key = %self.slot.key, %entity, ?tag, "set component");
        self.slot.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Removes one component; removing the last one deletes the entity.
    pub fn remove_component(&self, entity: EntityId, tag: ComponentTag) -> Result<(), StoreError> {
        let mut state = self.slot.state.write();
        state.entities.remove_component(entity, tag)?;
        trace!(key = %self.slot.key, %entity, ?tag, "removed component");
        self.slot.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Stores or overwrites the chunk at `vertex`. The payload must be
    /// exactly the world's chunk byte length.
    pub fn put_chunk(&self, vertex: Vertex, voxels: Vec<u8>) -> Result<(), StoreError> {
        if voxels.len() != self.chunk_len {
            return Err(StoreError::InvalidChunkSize {
                expected: self.chunk_len,
                actual: voxels.len(),
            });
        }
        let mut state = self.slot.state.write();
        state.voxels.put_chunk(vertex, voxels);
        trace!(key = %self.slot.key, vertex = vertex.index(), "put chunk");
        self.slot.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Removes the chunk at `vertex`, reverting it to procedural.
    /// Returns whether a chunk was present.
    pub fn remove_chunk(&self, vertex: Vertex) -> bool {
        let mut state = self.slot.state.write();
        let removed = state.voxels.remove_chunk(vertex);
        if removed {
            trace!(key = %self.slot.key, vertex = vertex.index(), "removed chunk");
            self.slot.dirty.store(true, Ordering::Release);
        }
        removed
    }
}

/// Read guard over one node's state. Holds the node's read lock; all
/// accessors observe one consistent snapshot.
pub struct NodeGuard<'a> {
    state: RwLockReadGuard<'a, SlotState>,
}

impl NodeGuard<'_> {
    pub fn entity_count(&self) -> usize {
        self.state.entities.entity_count()
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.state.entities.contains(entity)
    }

    /// One component of one entity.
    pub fn component(&self, entity: EntityId, tag: ComponentTag) -> Option<&[u8]> {
        self.state.entities.component(entity, tag)
    }

    /// Lazy iterator over rows whose archetype carries all of `required`.
    pub fn query(&self, required: &[ComponentTag]) -> Query<'_> {
        self.state.entities.query(required)
    }

    /// Current archetypes of the node.
    pub fn archetypes(&self) -> &[Archetype] {
        self.state.entities.archetypes()
    }

    /// Stored chunk at `vertex`, or `None` when the vertex is procedural.
    pub fn get_chunk(&self, vertex: Vertex) -> Option<&[u8]> {
        self.state.voxels.chunk(vertex)
    }

    pub fn chunk_count(&self) -> usize {
        self.state.voxels.chunk_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_graph::Side;

    #[allow(dead_code)]
    fn pos(byte: u8) -> [u8; 64] {
        [byte; 64]
    }

    fn options(chunk_size: u16, cache_nodes: usize) -> WorldOptions {
        WorldOptions { chunk_size: Some(chunk_size), cache_nodes, ..WorldOptions::default() }
    }

    #[test]
    fn resolving_the_same_path_shares_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();

        let first = store.resolve(&Path::from([Side::Top])).unwrap();
        let second = store.resolve_indices(&[0]).unwrap();
        assert_eq!(first.key(), second.key());

        first.insert_entity(EntityId(5), &[(ComponentTag::Name, b"shared")]).unwrap();
        assert!(second.read().contains_entity(EntityId(5)));
        assert!(second.is_dirty());
    }

    #[test]
    fn writes_dirty_the_node_and_flush_cleans_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();
        let node = store.resolve(&Path::new()).unwrap();
        assert!(!node.is_dirty());

        node.put_chunk(Vertex::A, vec![0u8; 16]).unwrap();
        assert!(node.is_dirty());
        assert_eq!(store.stats().dirty_nodes, 1);

        assert_eq!(store.flush().unwrap(), 1);
        assert!(!node.is_dirty());
        // A second flush has nothing to do.
        assert_eq!(store.flush().unwrap(), 0);
    }

    #[test]
    fn chunk_length_is_validated_against_world_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(16, 8)).unwrap();
        let node = store.resolve(&Path::new()).unwrap();

        node.put_chunk(Vertex::B, vec![0u8; 8192]).unwrap();
        let err = node.put_chunk(Vertex::B, vec![0u8; 8191]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidChunkSize { expected: 8192, actual: 8191 }));
    }

    #[test]
    fn reopening_with_a_different_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        WorldStore::open_with(dir.path(), options(16, 8)).unwrap().close().unwrap();

        let err = WorldStore::open_with(dir.path(), options(12, 8)).unwrap_err();
        assert!(matches!(err, StoreError::MetaMismatch { on_disk: 16, requested: 12 }));
        // Accepting the on-disk value works.
        let store = WorldStore::open(dir.path()).unwrap();
        assert_eq!(store.meta().chunk_size, 16);
    }

    #[test]
    fn eviction_persists_dirty_nodes_and_reload_restores_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 1)).unwrap();

        {
            let origin = store.resolve(&Path::new()).unwrap();
            origin.insert_entity(EntityId(1), &[(ComponentTag::Name, b"burrow")]).unwrap();
            origin.put_chunk(Vertex::C, vec![7u8; 16]).unwrap();
        }
        // Touch other nodes until the origin is pushed out.
        for side in [Side::Top, Side::UpperA, Side::UpperB] {
            store.resolve(&Path::from([side])).unwrap();
        }
        assert!(store.stats().cached_nodes <= 2);

        let origin = store.resolve(&Path::new()).unwrap();
        let guard = origin.read();
        assert_eq!(guard.component(EntityId(1), ComponentTag::Name), Some(b"burrow".as_slice()));
        assert_eq!(guard.get_chunk(Vertex::C), Some([7u8; 16].as_slice()));
    }

    #[test]
    fn pinned_nodes_are_never_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 1)).unwrap();

        let pinned = store.resolve(&Path::new()).unwrap();
        pinned.insert_entity(EntityId(1), &[(ComponentTag::Name, b"stay")]).unwrap();
        for side in [Side::Top, Side::UpperA] {
            store.resolve(&Path::from([side])).unwrap();
        }
        // Still dirty: eviction never flushed-and-dropped the pinned slot.
        assert!(pinned.is_dirty());
        assert!(pinned.read().contains_entity(EntityId(1)));
    }

    #[test]
    fn character_records_resolve_to_their_node() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();

        let home = store.resolve_indices(&[0, 4]).unwrap();
        home.insert_entity(EntityId(12), &[(ComponentTag::Name, b"rhoswen")]).unwrap();
        store
            .put_character("rhoswen", CharacterRecord { path: vec![0, 4], entity: EntityId(12) })
            .unwrap();

        let (node, entity) = store.resolve_character("rhoswen").unwrap().unwrap();
        assert_eq!(node.key(), home.key());
        assert_eq!(node.read().component(entity, ComponentTag::Name), Some(b"rhoswen".as_slice()));
        assert_eq!(store.character_names(), vec!["rhoswen".to_owned()]);
        assert!(store.resolve_character("nobody").unwrap().is_none());
    }

    #[test]
    fn character_paths_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();
        let err = store
            .put_character("broken", CharacterRecord { path: vec![12], entity: EntityId(1) })
            .unwrap_err();
        assert!(matches!(err, StoreError::Traversal(_)));
        assert!(store.get_character("broken").is_none());
    }

    #[test]
    fn verify_reports_only_the_corrupt_node() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();

        let good = store.resolve(&Path::from([Side::Top])).unwrap();
        good.insert_entity(EntityId(1), &[(ComponentTag::Name, b"fine")]).unwrap();
        let bad = store.resolve(&Path::from([Side::Bottom])).unwrap();
        bad.put_chunk(Vertex::A, vec![0u8; 16]).unwrap();
        store.flush().unwrap();

        // Overwrite one file with garbage behind the store's back.
        let bad_key = bad.key();
        std::fs::write(dir.path().join("nodes").join(format!("{bad_key}.node")), b"garbage").unwrap();

        let report = store.verify().unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(report.corrupt[0].0, bad_key);
        assert!(!report.is_clean());
    }

    #[test]
    fn corrupt_node_fails_alone_and_load_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let key = {
            let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();
            let node = store.resolve(&Path::from([Side::UpperC])).unwrap();
            node.insert_entity(EntityId(1), &[(ComponentTag::Name, b"x")]).unwrap();
            let sibling = store.resolve(&Path::from([Side::UpperD])).unwrap();
            sibling.insert_entity(EntityId(2), &[(ComponentTag::Name, b"y")]).unwrap();
            store.flush().unwrap();
            node.key()
        };
        let node_file = dir.path().join("nodes").join(format!("{key}.node"));
        let pristine = std::fs::read(&node_file).unwrap();
        std::fs::write(&node_file, b"garbage").unwrap();

        let store = WorldStore::open_with(dir.path(), options(2, 8)).unwrap();
        let err = store.resolve(&Path::from([Side::UpperC])).unwrap_err();
        assert!(matches!(err, StoreError::CorruptNode { .. }));
        // The sibling is unaffected.
        let sibling = store.resolve(&Path::from([Side::UpperD])).unwrap();
        assert!(sibling.read().contains_entity(EntityId(2)));
        // Restoring the file makes the same resolve succeed.
        std::fs::write(&node_file, &pristine).unwrap();
        let node = store.resolve(&Path::from([Side::UpperC])).unwrap();
        assert!(node.read().contains_entity(EntityId(1)));
    }

    #[test]
    fn parallel_writers_on_distinct_nodes_do_not_interfere() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorldStore::open_with(dir.path(), options(2, 32)).unwrap();

        std::thread::scope(|scope| {
            for (slot, side) in [Side::Top, Side::UpperA, Side::UpperB, Side::Bottom]
                .into_iter()
                .enumerate()
            {
                let store = &store;
                scope.spawn(move || {
                    let node = store.resolve(&Path::from([side])).unwrap();
                    for i in 0..50u64 {
                        let id = EntityId(slot as u64 * 1000 + i);
                        node.insert_entity(id, &[(ComponentTag::Name, b"w")]).unwrap();
                    }
                });
            }
        });

        for side in [Side::Top, Side::UpperA, Side::UpperB, Side::Bottom] {
            let node = store.resolve(&Path::from([side])).unwrap();
            assert_eq!(node.read().entity_count(), 50);
        }
        store.flush().unwrap();
    }
}
