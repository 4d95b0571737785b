// Error taxonomy for the world store.
//
// Three families, kept distinct because callers react differently to
// each. Caller bugs (`DuplicateEntity`, `UnknownEntity`,
// `MissingComponent`, `ComponentSizeMismatch`, `DuplicateComponentTag`)
// surface immediately and mutate nothing. Integrity failures
// (`CorruptNode`, `CorruptMeta`, `MetaMismatch`) are fatal for the
// affected node or world file only; every other node stays usable.
// I/O failures are transient: a failed flush leaves the in-memory state
// dirty and intact, a failed load leaves the slot unloaded, and both
// can be retried.

use std::io;

use thiserror::Error;
use warren_graph::{GraphError, NodeKey};
use warren_wire::{ComponentTag, WireError};

use crate::archetype::EntityId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert of an entity ID that already exists somewhere in the node.
    #[error("entity {0} already exists in this node")]
    DuplicateEntity(EntityId),

    /// Operation on an entity ID the node does not hold.
    #[error("entity {0} is not present in this node")]
    UnknownEntity(EntityId),

    /// Component removal for a tag the entity does not carry.
    #[error("entity {entity} has no {tag:?} component")]
    MissingComponent { entity: EntityId, tag: ComponentTag },

    /// Payload length disagrees with a fixed-layout component.
    #[error("{tag:?} payload is {actual} bytes, expected {expected}")]
    ComponentSizeMismatch {
        tag: ComponentTag,
        expected: usize,
        actual: usize,
    },

    /// The same tag appears twice in one insert.
    #[error("component {0:?} listed twice in insert")]
    DuplicateComponentTag(ComponentTag),

    /// Chunk payload length disagrees with the world's `chunk_size`.
    #[error("chunk payload is {actual} bytes, expected {expected}")]
    InvalidChunkSize { expected: usize, actual: usize },

    /// A node file failed structural validation. Other nodes are unaffected.
    #[error("node {key} is corrupt: {source}")]
    CorruptNode { key: NodeKey, source: WireError },

    /// `meta.json` or `characters.json` is unreadable.
    #[error("world metadata is corrupt: {0}")]
    CorruptMeta(String),

    /// The world on disk was created with a different `chunk_size`.
    #[error("world has chunk_size {on_disk}, requested {requested}")]
    MetaMismatch { on_disk: u16, requested: u16 },

    /// Rejected `WorldOptions` value.
    #[error("invalid world options: {0}")]
    InvalidOptions(&'static str),

    /// An out-of-range edge index in a stored or supplied path.
    #[error(transparent)]
    Traversal(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
