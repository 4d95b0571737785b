// On-disk layout and the node record codecs.
//
// Module overview: a world is a directory. `meta.json` holds the
// immutable `WorldMeta`, `characters.json` the named character records,
// and `nodes/` one file per persisted graph node, named by the node's
// key as 32 hex digits. Node files use the `warren_wire` record
// envelope; this module owns the two section codecs (entity archetypes,
// voxel chunks) because they need the store's in-memory types.
//
// Every write is atomic: serialize to `<name>.tmp` in the same
// directory, fsync, then rename over the final path. A write that dies
// partway leaves the previous version untouched.
//
// See also: `warren_wire::record` for the envelope, `world.rs` for when
// nodes are loaded and stored.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use smallvec::SmallVec;
use tracing::warn;
use warren_graph::{NodeKey, Vertex};
use warren_wire::framing::{put_bytes, put_u8, put_u16, put_u32, put_u64};
use warren_wire::record::{SECTION_ENTITIES, SECTION_VOXELS};
use warren_wire::{
    ByteReader, ComponentLayout, ComponentTag, RecordReader, RecordWriter, WireError,
    check_chunk_len,
};

use crate::archetype::{Archetype, Column, ColumnData, EntityId, Signature};
use crate::config::{CharacterRecord, UnknownComponents, WORLD_FORMAT_VERSION, WorldMeta};
use crate::entity::EntityNode;
use crate::error::StoreError;
use crate::voxel::VoxelNode;

const META_FILE: &str = "meta.json";
const CHARACTERS_FILE: &str = "characters.json";
const NODE_SUFFIX: &str = ".node";

// Column encoding bytes inside an entities section.
const COLUMN_FIXED: u8 = 0;
const COLUMN_VARIABLE: u8 = 1;

/// Filesystem half of the store: path bookkeeping and atomic writes.
#[derive(Debug)]
pub struct WorldDisk {
    root: PathBuf,
    nodes: PathBuf,
}

impl WorldDisk {
    /// Opens (creating if needed) the world directory layout.
    pub fn open(root: &Path) -> io::Result<WorldDisk> {
        let nodes = root.join("nodes");
        fs::create_dir_all(&nodes)?;
        Ok(WorldDisk { root: root.to_path_buf(), nodes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads `meta.json`. `None` when the directory is a fresh world.
    pub fn load_meta(&self) -> Result<Option<WorldMeta>, StoreError> {
        let raw = match fs::read_to_string(self.root.join(META_FILE)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let meta: WorldMeta =
            serde_json::from_str(&raw).map_err(|err| StoreError::CorruptMeta(err.to_string()))?;
        if meta.chunk_size == 0 {
            return Err(StoreError::CorruptMeta("chunk_size is zero".into()));
        }
        if meta.format_version != WORLD_FORMAT_VERSION {
            return Err(StoreError::CorruptMeta(format!(
                "unsupported world format version {}",
                meta.format_version
            )));
        }
        Ok(Some(meta))
    }

    pub fn store_meta(&self, meta: &WorldMeta) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(meta).map_err(io::Error::other)?;
        write_atomic(&self.root.join(META_FILE), json.as_bytes())?;
        Ok(())
    }

    /// Reads `characters.json`. Missing file means no characters yet.
    pub fn load_characters(&self) -> Result<BTreeMap<String, CharacterRecord>, StoreError> {
        let raw = match fs::read_to_string(self.root.join(CHARACTERS_FILE)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };
        serde_json::from_str(&raw)
            .map_err(|err| StoreError::CorruptMeta(format!("characters.json: {err}")))
    }

    pub fn store_characters(
        &self,
        records: &BTreeMap<String, CharacterRecord>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(io::Error::other)?;
        write_atomic(&self.root.join(CHARACTERS_FILE), json.as_bytes())?;
        Ok(())
    }

    fn node_path(&self, key: NodeKey) -> PathBuf {
        self.nodes.join(format!("{key}{NODE_SUFFIX}"))
    }

    /// Raw bytes of a node file, or `None` when the node was never stored.
    pub fn load_node(&self, key: NodeKey) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.node_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn store_node(&self, key: NodeKey, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.node_path(key), bytes)
    }

    /// Keys of every node file on disk, sorted. Files that do not parse
    /// as a key (leftover temp files, strays) are ignored.
    pub fn node_keys(&self) -> io::Result<Vec<NodeKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.nodes)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(NODE_SUFFIX) else { continue };
            if let Some(key) = NodeKey::from_hex(stem) {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}

/// Serialize-to-temp-then-rename. The rename is what commits.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Encodes a node's full state as one record.
pub fn encode_node(entities: &EntityNode, voxels: &VoxelNode) -> Vec<u8> {
    let mut writer = RecordWriter::new();
    if !entities.is_empty() {
        writer.section(SECTION_ENTITIES, &encode_entities(entities));
    }
    if !voxels.is_empty() {
        writer.section(SECTION_VOXELS, &encode_voxels(voxels));
    }
    writer.finish()
}

/// Decodes a node record into its entity and voxel state.
///
/// Unknown sections are skipped (and consequently dropped on the next
/// flush); unknown component tags follow `policy`.
pub fn decode_node(
    bytes: &[u8],
    meta: &WorldMeta,
    policy: UnknownComponents,
) -> Result<(EntityNode, VoxelNode), WireError> {
    let mut reader = RecordReader::new(bytes)?;
    let mut entities = EntityNode::new();
    let mut voxels = VoxelNode::new();
    while let Some((section, body)) = reader.next_section()? {
        match section {
            SECTION_ENTITIES => entities = decode_entities(body, policy)?,
            SECTION_VOXELS => voxels = decode_voxels(body, meta)?,
            other => warn!(section = other, "skipping unknown node file section"),
        }
    }
    Ok((entities, voxels))
}

// Entities section: u32 archetype count, then per archetype a u32 row
// count, u16 column count, the entity IDs (u64 each), the column tags
// (u16 each, strictly increasing), and the columns themselves. Each
// column is self-describing: an encoding byte, then either a u32 width
// plus packed rows (fixed) or a length-prefixed payload per row
// (variable). Self-description is what lets a decoder recover row
// boundaries for tags it has never heard of.
fn encode_entities(node: &EntityNode) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, node.archetypes().len() as u32);
    for archetype in node.archetypes() {
        put_u32(&mut out, archetype.len() as u32);
        put_u16(&mut out, archetype.signature().len() as u16);
        for &entity in archetype.entities() {
            put_u64(&mut out, entity.0);
        }
        for &tag in archetype.signature().tags() {
            put_u16(&mut out, tag.code());
        }
        for column in archetype.columns() {
            match column.data() {
                ColumnData::Fixed { width, bytes } => {
                    put_u8(&mut out, COLUMN_FIXED);
                    put_u32(&mut out, *width as u32);
                    out.extend_from_slice(bytes);
                }
                ColumnData::Variable { rows } => {
                    put_u8(&mut out, COLUMN_VARIABLE);
                    for row in rows {
                        put_bytes(&mut out, row);
                    }
                }
            }
        }
    }
    out
}

fn decode_entities(body: &[u8], policy: UnknownComponents) -> Result<EntityNode, WireError> {
    let mut reader = ByteReader::new(body);
    let archetype_count = reader.read_u32()? as usize;
    let mut archetypes = Vec::with_capacity(archetype_count.min(64));
    for _ in 0..archetype_count {
        let rows = reader.read_u32()? as usize;
        let cols = reader.read_u16()? as usize;

        let mut entities = Vec::with_capacity(rows.min(4096));
        for _ in 0..rows {
            entities.push(EntityId(reader.read_u64()?));
        }

        let mut tags: SmallVec<[ComponentTag; 4]> = SmallVec::with_capacity(cols);
        let mut previous: Option<u16> = None;
        for _ in 0..cols {
            let code = reader.read_u16()?;
            if previous.is_some_and(|p| code <= p) {
                return Err(WireError::CorruptArchetype("component tags out of order"));
            }
            previous = Some(code);
            let tag = ComponentTag::from_code(code);
            if !tag.is_known() && policy == UnknownComponents::Reject {
                return Err(WireError::UnknownComponentType(code));
            }
            tags.push(tag);
        }

        let mut columns = Vec::with_capacity(cols);
        for &tag in &tags {
            let data = match reader.read_u8()? {
                COLUMN_FIXED => {
                    let width = reader.read_u32()? as usize;
                    if width == 0 {
                        return Err(WireError::CorruptArchetype("fixed column with zero width"));
                    }
                    let bytes = reader.take(rows * width)?.to_vec();
                    ColumnData::Fixed { width, bytes }
                }
                COLUMN_VARIABLE => {
                    let mut row_data = Vec::with_capacity(rows.min(4096));
                    for _ in 0..rows {
                        row_data.push(reader.read_bytes()?.to_vec());
                    }
                    ColumnData::Variable { rows: row_data }
                }
                _ => return Err(WireError::CorruptArchetype("unrecognized column encoding")),
            };
            match (tag.layout(), &data) {
                (ComponentLayout::Fixed(expected), ColumnData::Fixed { width, .. })
                    if *width == expected => {}
                (ComponentLayout::Fixed(_), _) => {
                    return Err(WireError::CorruptArchetype("column layout does not match tag"));
                }
                (ComponentLayout::Variable, ColumnData::Fixed { .. }) if tag.is_known() => {
                    return Err(WireError::CorruptArchetype("column layout does not match tag"));
                }
                _ => {}
            }
            columns.push(Column::from_data(tag, data));
        }

        let signature = Signature::new(tags.iter().copied());
        archetypes.push(Archetype::from_parts(signature, entities, columns)?);
    }
    EntityNode::from_archetypes(archetypes)
}

// Voxels section: u8 chunk count, then per chunk a u8 vertex index and
// the length-prefixed payload. Payload length must equal the world's
// chunk byte length exactly.
fn encode_voxels(node: &VoxelNode) -> Vec<u8> {
    let mut out = Vec::new();
    put_u8(&mut out, node.chunk_count() as u8);
    for (vertex, chunk) in node.iter() {
        put_u8(&mut out, vertex.index() as u8);
        put_bytes(&mut out, chunk);
    }
    out
}

fn decode_voxels(body: &[u8], meta: &WorldMeta) -> Result<VoxelNode, WireError> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_u8()?;
    let mut node = VoxelNode::new();
    for _ in 0..count {
        let raw = reader.read_u8()?;
        let vertex = Vertex::from_index(raw).ok_or(WireError::InvalidVertex(raw))?;
        let payload = reader.read_bytes()?;
        check_chunk_len(meta.chunk_size, payload.len())?;
        if node.chunk(vertex).is_some() {
            return Err(WireError::DuplicateChunk(raw));
        }
        node.put_chunk(vertex, payload.to_vec());
    }
    Ok(node)
}
