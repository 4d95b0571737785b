// World metadata and open-time options.
//
// `WorldMeta` is the tiny JSON file that makes a directory a world; it
// is written once at creation and immutable for the life of the world.
// `WorldOptions` is the per-open configuration and is never persisted.
// `CharacterRecord` is the JSON shape of one entry in `characters.json`.

use serde::{Deserialize, Serialize};

use crate::archetype::EntityId;

/// World format version this build reads and writes.
pub const WORLD_FORMAT_VERSION: u32 = 1;

/// Edge length, in voxels, of a chunk when the creator does not choose one.
pub const DEFAULT_CHUNK_SIZE: u16 = 12;

/// Default working-set capacity, in nodes.
pub const DEFAULT_CACHE_NODES: usize = 256;

/// Immutable per-world parameters, stored as `meta.json`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorldMeta {
    /// Edge length of every voxel chunk in this world. Fixed at creation;
    /// all chunk payloads are validated against it.
    pub chunk_size: u16,
    pub format_version: u32,
}

impl WorldMeta {
    pub fn new(chunk_size: u16) -> WorldMeta {
        WorldMeta { chunk_size, format_version: WORLD_FORMAT_VERSION }
    }

    /// Exact byte length of a valid chunk payload in this world.
    pub fn chunk_byte_len(&self) -> usize {
        warren_wire::chunk_byte_len(self.chunk_size)
    }
}

/// What to do with component tags this build does not recognize when
/// decoding a node file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownComponents {
    /// Carry unknown columns opaquely and re-encode them on flush, so a
    /// newer world survives a round trip through this build.
    #[default]
    Preserve,
    /// Fail the node load with `UnknownComponentType`.
    Reject,
}

/// Per-open configuration for a world store.
#[derive(Clone, Debug)]
pub struct WorldOptions {
    /// Chunk edge length. `None` accepts whatever the world on disk was
    /// created with (or [`DEFAULT_CHUNK_SIZE`] for a new world); `Some`
    /// additionally asserts the value, failing with `MetaMismatch` when
    /// an existing world disagrees.
    pub chunk_size: Option<u16>,
    /// Working-set capacity in nodes. Least-recently-used nodes beyond
    /// this are flushed and dropped; nodes held by live handles are never
    /// evicted, so the cap is soft under handle pressure.
    pub cache_nodes: usize,
    pub unknown_components: UnknownComponents,
}

impl Default for WorldOptions {
    fn default() -> WorldOptions {
        WorldOptions {
            chunk_size: None,
            cache_nodes: DEFAULT_CACHE_NODES,
            unknown_components: UnknownComponents::default(),
        }
    }
}

/// Where a named character lives: the path of its home node plus its
/// entity ID there. The JSON map in `characters.json` is keyed by name.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CharacterRecord {
    /// Edge indices from the origin to the character's node.
    pub path: Vec<u8>,
    pub entity: EntityId,
}
