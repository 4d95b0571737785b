// Persistent world storage for a graph-addressed voxel world.
//
// Module overview: the store keeps each graph node's state, entities in
// columnar archetype tables plus up to twenty voxel chunks, cached in a
// bounded working set and persisted as one checksummed file per node.
// `world` is the facade everything goes through; `entity` and
// `archetype` implement the table mechanics, `voxel` the chunk slots,
// `disk` the file layout and codecs, `config` the metadata and options,
// `error` the taxonomy.
//
// See also: `warren_graph` for how paths become stable node keys,
// `warren_wire` for the byte-level formats.

pub mod archetype;
pub mod config;
pub mod disk;
pub mod entity;
pub mod error;
pub mod voxel;
pub mod world;

pub use archetype::{Archetype, EntityId, RowView, Signature};
pub use config::{
    CharacterRecord, DEFAULT_CACHE_NODES, DEFAULT_CHUNK_SIZE, UnknownComponents, WorldMeta,
    WorldOptions,
};
pub use entity::{EntityNode, Query};
pub use error::StoreError;
pub use voxel::VoxelNode;
pub use world::{NodeGuard, NodeHandle, StoreStats, VerifyReport, WorldStore};

// The types that appear in this crate's public signatures.
pub use warren_graph::{NodeKey, Path, Side, Vertex};
pub use warren_wire::ComponentTag;
