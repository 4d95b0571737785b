// Columnar archetype tables.
//
// Module overview: entities that share a component-type set live
// together in one archetype, stored as parallel columns so a query over
// a tag set walks dense arrays instead of chasing per-entity maps. The
// sorted tag sequence (the signature) is the archetype's identity; rows
// are kept packed with swap-remove, so row indices are only stable
// between structural changes and the entity index in `entity.rs` is the
// single source of truth for where an entity lives.
//
// See also: `entity.rs` for the per-node table-of-archetypes and the
// structural migration that moves rows between signatures, `disk.rs`
// for the wire form of a column.
//
// **Critical constraint: columns stay parallel.** Every column of an
// archetype holds exactly one row per entry of the entity list, in the
// same order. All mutation goes through `push_row`/`swap_remove_row`,
// which touch every column or none.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use warren_wire::{ComponentLayout, ComponentTag, WireError};

/// Entity identity, unique within its node. IDs are assigned by the
/// simulation, not the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sorted, duplicate-free set of component tags; the identity of an
/// archetype. Two component sets are the same archetype exactly when
/// their signatures compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(SmallVec<[ComponentTag; 4]>);

impl Signature {
    /// Builds a signature from tags in any order. Duplicates collapse;
    /// callers that must reject duplicates check before constructing.
    pub fn new(tags: impl IntoIterator<Item = ComponentTag>) -> Signature {
        let mut list: SmallVec<[ComponentTag; 4]> = tags.into_iter().collect();
        list.sort_unstable();
        list.dedup();
        Signature(list)
    }

    /// Tags in sorted order.
    pub fn tags(&self) -> &[ComponentTag] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: ComponentTag) -> bool {
        self.0.binary_search(&tag).is_ok()
    }

    /// Position of `tag` within the sorted sequence.
    pub fn position(&self, tag: ComponentTag) -> Option<usize> {
        self.0.binary_search(&tag).ok()
    }

    /// True when every tag in `required` is present.
    pub fn contains_all(&self, required: &[ComponentTag]) -> bool {
        required.iter().all(|&tag| self.contains(tag))
    }

    /// This signature plus `tag`.
    pub fn with(&self, tag: ComponentTag) -> Signature {
        let mut list = self.0.clone();
        if let Err(slot) = list.binary_search(&tag) {
            list.insert(slot, tag);
        }
        Signature(list)
    }

    /// This signature minus `tag`.
    pub fn without(&self, tag: ComponentTag) -> Signature {
        let mut list = self.0.clone();
        if let Ok(slot) = list.binary_search(&tag) {
            list.remove(slot);
        }
        Signature(list)
    }
}

/// Storage for one column's payload bytes.
#[derive(Clone, Debug)]
pub enum ColumnData {
    /// Fixed-width rows packed back to back. `width` is never zero.
    Fixed { width: usize, bytes: Vec<u8> },
    /// Variable-width rows, one allocation each.
    Variable { rows: Vec<Vec<u8>> },
}

/// One component type's dense per-entity array.
#[derive(Clone, Debug)]
pub struct Column {
    tag: ComponentTag,
    data: ColumnData,
}

impl Column {
    /// Fresh empty column with the storage the tag's layout calls for.
    pub fn new(tag: ComponentTag) -> Column {
        let data = match tag.layout() {
            ComponentLayout::Fixed(width) => ColumnData::Fixed { width, bytes: Vec::new() },
            ComponentLayout::Variable => ColumnData::Variable { rows: Vec::new() },
        };
        Column { tag, data }
    }

    /// Column rebuilt from decoded wire data. The wire encoding is
    /// preserved even for unknown tags, so a retained opaque column is
    /// re-written exactly as it arrived.
    pub(crate) fn from_data(tag: ComponentTag, data: ColumnData) -> Column {
        Column { tag, data }
    }

    pub fn tag(&self) -> ComponentTag {
        self.tag
    }

    pub(crate) fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Row count currently stored.
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Fixed { width, bytes } => bytes.len() / width,
            ColumnData::Variable { rows } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload of one row.
    pub fn row(&self, index: usize) -> &[u8] {
        match &self.data {
            ColumnData::Fixed { width, bytes } => &bytes[index * width..(index + 1) * width],
            ColumnData::Variable { rows } => &rows[index],
        }
    }

    fn push(&mut self, payload: &[u8]) {
        match &mut self.data {
            ColumnData::Fixed { width, bytes } => {
                debug_assert_eq!(payload.len(), *width);
                bytes.extend_from_slice(payload);
            }
            ColumnData::Variable { rows } => rows.push(payload.to_vec()),
        }
    }

    fn set(&mut self, index: usize, payload: &[u8]) {
        match &mut self.data {
            ColumnData::Fixed { width, bytes } => {
                debug_assert_eq!(payload.len(), *width);
                bytes[index * *width..(index + 1) * *width].copy_from_slice(payload);
            }
            ColumnData::Variable { rows } => rows[index] = payload.to_vec(),
        }
    }

    fn swap_remove(&mut self, index: usize) {
        match &mut self.data {
            ColumnData::Fixed { width, bytes } => {
                let width = *width;
                let last = bytes.len() / width - 1;
                if index != last {
                    let (head, tail) = bytes.split_at_mut(last * width);
                    head[index * width..(index + 1) * width].copy_from_slice(&tail[..width]);
                }
                bytes.truncate(last * width);
            }
            ColumnData::Variable { rows } => {
                rows.swap_remove(index);
            }
        }
    }
}

/// Entities sharing one signature, as an entity list plus parallel columns.
#[derive(Clone, Debug)]
pub struct Archetype {
    signature: Signature,
    entities: Vec<EntityId>,
    columns: Vec<Column>,
}

impl Archetype {
    /// Empty archetype for a signature, one column per tag.
    pub fn new(signature: Signature) -> Archetype {
        let columns = signature.tags().iter().map(|&tag| Column::new(tag)).collect();
        Archetype { signature, entities: Vec::new(), columns }
    }

    /// Reassembles an archetype from decoded parts, validating that the
    /// columns line up with the signature and with each other.
    pub(crate) fn from_parts(
        signature: Signature,
        entities: Vec<EntityId>,
        columns: Vec<Column>,
    ) -> Result<Archetype, WireError> {
        if columns.len() != signature.len() {
            return Err(WireError::CorruptArchetype("column count does not match signature"));
        }
        for (column, &tag) in columns.iter().zip(signature.tags()) {
            if column.tag() != tag {
                return Err(WireError::CorruptArchetype("column order does not match signature"));
            }
            if column.len() != entities.len() {
                return Err(WireError::CorruptArchetype("column row count does not match entity list"));
            }
        }
        Ok(Archetype { signature, entities, columns })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Entity IDs in row order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Payload of one component of one row.
    pub fn component(&self, row: usize, tag: ComponentTag) -> Option<&[u8]> {
        let slot = self.signature.position(tag)?;
        Some(self.columns[slot].row(row))
    }

    /// View over one row.
    pub fn row(&self, row: usize) -> RowView<'_> {
        RowView { archetype: self, row }
    }

    /// Appends one row. `payloads` must be in signature order, one per
    /// column; sizes were validated by the caller.
    pub(crate) fn push_row(&mut self, entity: EntityId, payloads: &[&[u8]]) {
        debug_assert_eq!(payloads.len(), self.columns.len());
        self.entities.push(entity);
        for (column, payload) in self.columns.iter_mut().zip(payloads) {
            column.push(payload);
        }
    }

    /// Overwrites one component of one row in place. The tag must be in
    /// the signature.
    pub(crate) fn set_component(&mut self, row: usize, tag: ComponentTag, payload: &[u8]) {
        if let Some(slot) = self.signature.position(tag) {
            self.columns[slot].set(row, payload);
        }
    }

    /// Removes a row by swapping the last row into its place. Returns the
    /// entity that moved into `row`, if any, so the caller can repair its
    /// index entry.
    pub(crate) fn swap_remove_row(&mut self, row: usize) -> Option<EntityId> {
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        if row < last { Some(self.entities[row]) } else { None }
    }
}

/// Borrowed view of one entity's row.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    archetype: &'a Archetype,
    row: usize,
}

impl<'a> RowView<'a> {
    pub fn entity(&self) -> EntityId {
        self.archetype.entities[self.row]
    }

    /// Payload for `tag`, or `None` when the archetype lacks the column.
    pub fn get(&self, tag: ComponentTag) -> Option<&'a [u8]> {
        self.archetype.component(self.row, tag)
    }

    /// Tags this row carries, in signature order.
    pub fn tags(&self) -> &'a [ComponentTag] {
        self.archetype.signature.tags()
    }
}
