// Test-only world fixture for persistence integration tests.
//
// Wraps a real `WorldStore` (from `warren_store`) rooted in a temp
// directory so tests can run several sessions against one world on
// disk: open → mutate → flush → drop → reopen → verify. The only
// test-specific code here is the fixture plumbing (temp dirs, payload
// builders, a hand-assembled node file for forward-compatibility
// scenarios). All storage logic uses the same code paths as a live
// world.
//
// See also: `tests/world_lifecycle.rs` for the scenarios.

use tempfile::TempDir;
use warren_store::disk::WorldDisk;
use warren_store::{EntityId, WorldOptions, WorldStore};
use warren_wire::framing::{put_bytes, put_u8, put_u16, put_u32, put_u64};
use warren_wire::record::{SECTION_ENTITIES, SECTION_VOXELS};
use warren_wire::{CHARACTER_STATE_LEN, POSITION_LEN, RecordWriter};

/// A world directory that outlives individual store sessions.
pub struct WorldFixture {
    dir: TempDir,
    pub chunk_size: u16,
    pub cache_nodes: usize,
}

impl WorldFixture {
    /// A fixture with a small chunk edge (4, so 128-byte chunks) and a
    /// cache large enough that nothing is evicted unless a test asks.
    pub fn new() -> Self {
        Self::with_cache(64)
    }

    /// Same as `new` but with an explicit working-set cap, for tests
    /// that want eviction to actually happen.
    pub fn with_cache(cache_nodes: usize) -> Self {
        WorldFixture {
            dir: TempDir::new().expect("create temp world dir"),
            chunk_size: 4,
            cache_nodes,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Bytes per voxel chunk under this fixture's chunk size.
    pub fn chunk_len(&self) -> usize {
        warren_wire::chunk_byte_len(self.chunk_size)
    }

    /// Opens a store session against the fixture directory. Call again
    /// after dropping the previous session to simulate a restart.
    pub fn open(&self) -> WorldStore {
        let options = WorldOptions {
            chunk_size: Some(self.chunk_size),
            cache_nodes: self.cache_nodes,
            ..WorldOptions::default()
        };
        WorldStore::open_with(self.root(), options).expect("open world session")
    }

    /// Direct disk access, bypassing the store. Used to plant corrupt
    /// or hand-assembled node files between sessions.
    pub fn disk(&self) -> WorldDisk {
        WorldDisk::open(self.root()).expect("open world dir")
    }
}

impl Default for WorldFixture {
    fn default() -> Self {
        WorldFixture::new()
    }
}

/// A 64-byte transform payload: an identity matrix with a translation
/// derived from `seed`, so payloads are distinguishable per entity.
pub fn position_payload(seed: u64) -> Vec<u8> {
    let mut cells = [0.0f32; 16];
    cells[0] = 1.0;
    cells[5] = 1.0;
    cells[10] = 1.0;
    cells[15] = 1.0;
    cells[12] = seed as f32;
    cells[14] = -(seed as f32);
    let mut out = Vec::with_capacity(POSITION_LEN);
    for cell in cells {
        out.extend_from_slice(&cell.to_le_bytes());
    }
    out
}

/// A 28-byte character state payload: a velocity derived from `seed`
/// and an identity orientation.
pub fn state_payload(seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHARACTER_STATE_LEN);
    for component in [seed as f32, 0.0, seed as f32 / 2.0] {
        out.extend_from_slice(&component.to_le_bytes());
    }
    for component in [0.0f32, 0.0, 0.0, 1.0] {
        out.extend_from_slice(&component.to_le_bytes());
    }
    out
}

/// A chunk payload of `len` bytes holding one voxel tag repeated.
pub fn chunk_payload(len: usize, tag: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        out.extend_from_slice(&tag.to_le_bytes());
    }
    out
}

/// Assembles a node file the way a newer build would write it: one
/// entity carrying a transform plus a column with an unrecognized tag,
/// one voxel chunk, and a trailing section with an unrecognized tag.
///
/// The bytes are laid out by hand rather than through the store's own
/// encoder, so these tests also catch accidental drift in the node
/// file format itself.
pub fn future_build_node(
    entity: EntityId,
    unknown_tag: u16,
    unknown_payload: &[u8],
    chunk: &[u8],
) -> Vec<u8> {
    assert!(unknown_tag >= 3, "codes below 3 are taken");

    let mut entities = Vec::new();
    put_u32(&mut entities, 1); // archetypes
    put_u32(&mut entities, 1); // rows
    put_u16(&mut entities, 2); // columns
    put_u64(&mut entities, entity.0);
    put_u16(&mut entities, 0); // Position code
    put_u16(&mut entities, unknown_tag);
    put_u8(&mut entities, 0); // fixed encoding
    put_u32(&mut entities, POSITION_LEN as u32);
    entities.extend_from_slice(&position_payload(entity.0));
    put_u8(&mut entities, 1); // variable encoding
    put_bytes(&mut entities, unknown_payload);

    let mut voxels = Vec::new();
    put_u8(&mut voxels, 1); // chunks
    put_u8(&mut voxels, 0); // vertex A
    put_bytes(&mut voxels, chunk);

    let mut writer = RecordWriter::new();
    writer.section(SECTION_ENTITIES, &entities);
    writer.section(SECTION_VOXELS, &voxels);
    writer.section(9000, b"telemetry from a build we have not written yet");
    writer.finish()
}
