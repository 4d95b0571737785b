// Binary wire format for warren world storage.
//
// Module overview: everything that touches raw bytes on disk lives here.
// `framing` has the little-endian primitives and the slice cursor,
// `tag` names component columns and their row layouts, `chunk` fixes the
// voxel payload size law, and `record` frames whole node files behind a
// magic number and a checksum. Higher layers decide what the bytes mean;
// this crate only decides whether they are well formed.
//
// See also: the storage crate's disk module, which composes these pieces
// into full node encode and decode.

pub mod chunk;
pub mod framing;
pub mod record;
pub mod tag;

pub use chunk::{VOXEL_WIDTH, check_chunk_len, chunk_byte_len, voxel_offset};
pub use framing::ByteReader;
pub use record::{FORMAT_VERSION, NODE_MAGIC, RecordReader, RecordWriter};
pub use tag::{CHARACTER_STATE_LEN, ComponentLayout, ComponentTag, POSITION_LEN};

use thiserror::Error;

/// Everything that can be wrong with bytes read off disk.
///
/// A node file that produces any of these is treated as corrupt as a
/// whole; in-memory state for other nodes is never affected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Data ended before a field was complete.
    #[error("record truncated at byte {offset}")]
    Truncated { offset: usize },

    /// A declared length no honest writer would produce.
    #[error("declared length {declared} exceeds limit {limit}")]
    Oversized { declared: u64, limit: u64 },

    /// The file does not start with the node record magic.
    #[error("bad magic bytes {found:02x?}")]
    BadMagic { found: [u8; 4] },

    /// Written by a format version this build does not speak.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    /// The section stream does not match its recorded checksum.
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// The entity table violates its own structure.
    #[error("corrupt archetype table: {0}")]
    CorruptArchetype(&'static str),

    /// A component tag this build does not know, under a policy that
    /// refuses to carry opaque columns.
    #[error("unknown component type {0}")]
    UnknownComponentType(u16),

    /// A chunk payload whose size disagrees with the world's `chunk_size`.
    #[error("chunk payload is {actual} bytes, expected {expected}")]
    InvalidChunkSize { expected: usize, actual: usize },

    /// A chunk addressed to a vertex the dodecahedron does not have.
    #[error("vertex index {0} out of range, dodecahedron has 20")]
    InvalidVertex(u8),

    /// Two chunks claiming the same vertex within one node.
    #[error("duplicate chunk at vertex {0}")]
    DuplicateChunk(u8),
}
