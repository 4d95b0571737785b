// Per-node entity table: archetypes plus the entity location index.
//
// Module overview: a node's entities live in however many archetypes
// their component sets call for, with a hash index from entity ID to
// (archetype, row) on the side. Structural changes always build the new
// row first, commit the index, then swap-remove the old row, so a
// mid-operation failure can reject cleanly without a half-moved entity.
// Empty archetypes are pruned immediately; at most one archetype exists
// per signature.
//
// See also: `archetype.rs` for the column mechanics, `world.rs` which
// wraps one `EntityNode` per cached graph node behind a lock.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use warren_wire::{ComponentLayout, ComponentTag, WireError};

use crate::archetype::{Archetype, EntityId, RowView, Signature};
use crate::error::StoreError;

/// Where an entity's row lives.
#[derive(Clone, Copy, Debug)]
struct EntityLoc {
    archetype: usize,
    row: usize,
}

/// All entities of one graph node.
#[derive(Debug, Default)]
pub struct EntityNode {
    archetypes: Vec<Archetype>,
    index: FxHashMap<EntityId, EntityLoc>,
}

fn check_payload(tag: ComponentTag, payload: &[u8]) -> Result<(), StoreError> {
    if let ComponentLayout::Fixed(expected) = tag.layout() {
        if payload.len() != expected {
            return Err(StoreError::ComponentSizeMismatch { tag, expected, actual: payload.len() });
        }
    }
    Ok(())
}

impl EntityNode {
    pub fn new() -> EntityNode {
        EntityNode::default()
    }

    /// Rebuilds a node from decoded archetypes, recreating the index.
    pub(crate) fn from_archetypes(archetypes: Vec<Archetype>) -> Result<EntityNode, WireError> {
        let mut index = FxHashMap::default();
        for (slot, archetype) in archetypes.iter().enumerate() {
            if archetypes[..slot].iter().any(|a| a.signature() == archetype.signature()) {
                return Err(WireError::CorruptArchetype("two archetypes share a signature"));
            }
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let loc = EntityLoc { archetype: slot, row };
                if index.insert(entity, loc).is_some() {
                    return Err(WireError::CorruptArchetype("entity appears in more than one row"));
                }
            }
        }
        Ok(EntityNode { archetypes, index })
    }

    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// Current archetypes. Order is not meaningful and changes under
    /// structural edits.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// One component of one entity.
    pub fn component(&self, entity: EntityId, tag: ComponentTag) -> Option<&[u8]> {
        let loc = self.index.get(&entity)?;
        self.archetypes[loc.archetype].component(loc.row, tag)
    }

    /// Inserts a new entity with the given components.
    ///
    /// The tag set is canonicalized (sorted, duplicates rejected) and each
    /// fixed-layout payload is checked against its width before anything
    /// is touched, so a failed insert leaves the node unchanged.
    pub fn insert(
        &mut self,
        entity: EntityId,
        components: &[(ComponentTag, &[u8])],
    ) -> Result<(), StoreError> {
        if self.index.contains_key(&entity) {
            return Err(StoreError::DuplicateEntity(entity));
        }
        let mut parts: SmallVec<[(ComponentTag, &[u8]); 4]> = SmallVec::from_slice(components);
        parts.sort_unstable_by_key(|&(tag, _)| tag);
        for pair in parts.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(StoreError::DuplicateComponentTag(pair[0].0));
            }
        }
        for &(tag, payload) in &parts {
            check_payload(tag, payload)?;
        }

        let signature = Signature::new(parts.iter().map(|&(tag, _)| tag));
        let slot = self.find_or_create(signature);
        let payloads: SmallVec<[&[u8]; 4]> = parts.iter().map(|&(_, payload)| payload).collect();
        let row = self.archetypes[slot].len();
        self.archetypes[slot].push_row(entity, &payloads);
        self.index.insert(entity, EntityLoc { archetype: slot, row });
        Ok(())
    }

    /// Removes an entity and all its components.
    pub fn remove(&mut self, entity: EntityId) -> Result<(), StoreError> {
        let loc = match self.index.remove(&entity) {
            Some(loc) => loc,
            None => return Err(StoreError::UnknownEntity(entity)),
        };
        if let Some(moved) = self.archetypes[loc.archetype].swap_remove_row(loc.row) {
            if let Some(entry) = self.index.get_mut(&moved) {
                entry.row = loc.row;
            }
        }
        self.prune_if_empty(loc.archetype);
        Ok(())
    }

    /// Sets one component: in place when the entity's archetype already
    /// has the column, otherwise by structural migration to the signature
    /// plus the tag.
    pub fn set_component(
        &mut self,
        entity: EntityId,
        tag: ComponentTag,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        check_payload(tag, payload)?;
        let loc = match self.index.get(&entity) {
            Some(loc) => *loc,
            None => return Err(StoreError::UnknownEntity(entity)),
        };
        if self.archetypes[loc.archetype].signature().contains(tag) {
            self.archetypes[loc.archetype].set_component(loc.row, tag, payload);
            return Ok(());
        }
        self.migrate(entity, loc, Some((tag, payload)), None);
        Ok(())
    }

    /// Removes one component by inverse migration. An empty result
    /// signature deletes the entity outright.
    pub fn remove_component(&mut self, entity: EntityId, tag: ComponentTag) -> Result<(), StoreError> {
        let loc = match self.index.get(&entity) {
            Some(loc) => *loc,
            None => return Err(StoreError::UnknownEntity(entity)),
        };
        let signature = self.archetypes[loc.archetype].signature();
        if !signature.contains(tag) {
            return Err(StoreError::MissingComponent { entity, tag });
        }
        if signature.len() == 1 {
            return self.remove(entity);
        }
        self.migrate(entity, loc, None, Some(tag));
        Ok(())
    }

    /// Lazy iterator over every row whose archetype carries all of
    /// `required`. Restartable; row order is stable within an archetype
    /// for a given pass, with no order across archetypes.
    pub fn query(&self, required: &[ComponentTag]) -> Query<'_> {
        Query {
            node: self,
            required: Signature::new(required.iter().copied()),
            archetype: 0,
            row: 0,
        }
    }

    fn find_or_create(&mut self, signature: Signature) -> usize {
        match self.archetypes.iter().position(|a| *a.signature() == signature) {
            Some(slot) => slot,
            None => {
                self.archetypes.push(Archetype::new(signature));
                self.archetypes.len() - 1
            }
        }
    }

    /// Moves an entity's row to the archetype for its signature with
    /// `add` applied and `drop` removed. The target row is built and the
    /// index committed before the source row is deleted.
    fn migrate(
        &mut self,
        entity: EntityId,
        from: EntityLoc,
        add: Option<(ComponentTag, &[u8])>,
        drop: Option<ComponentTag>,
    ) {
        let mut target_sig = self.archetypes[from.archetype].signature().clone();
        if let Some((tag, _)) = add {
            target_sig = target_sig.with(tag);
        }
        if let Some(tag) = drop {
            target_sig = target_sig.without(tag);
        }

        let row: Vec<Vec<u8>> = {
            let source = &self.archetypes[from.archetype];
            target_sig
                .tags()
                .iter()
                .map(|&tag| match add {
                    Some((added, payload)) if added == tag => payload.to_vec(),
                    _ => source
                        .component(from.row, tag)
                        .map_or_else(Vec::new, |bytes| bytes.to_vec()),
                })
                .collect()
        };

        let target = self.find_or_create(target_sig);
        let payloads: SmallVec<[&[u8]; 4]> = row.iter().map(Vec::as_slice).collect();
        let new_row = self.archetypes[target].len();
        self.archetypes[target].push_row(entity, &payloads);
        self.index.insert(entity, EntityLoc { archetype: target, row: new_row });

        if let Some(moved) = self.archetypes[from.archetype].swap_remove_row(from.row) {
            if let Some(entry) = self.index.get_mut(&moved) {
                entry.row = from.row;
            }
        }
        self.prune_if_empty(from.archetype);
    }

    /// Drops an archetype that no longer holds rows. The archetype list
    /// uses swap-remove, so locations pointing at the moved archetype are
    /// rewritten.
    fn prune_if_empty(&mut self, slot: usize) {
        if !self.archetypes[slot].is_empty() {
            return;
        }
        self.archetypes.swap_remove(slot);
        if slot < self.archetypes.len() {
            for &entity in self.archetypes[slot].entities() {
                if let Some(entry) = self.index.get_mut(&entity) {
                    entry.archetype = slot;
                }
            }
        }
    }
}

/// Iterator returned by [`EntityNode::query`].
pub struct Query<'a> {
    node: &'a EntityNode,
    required: Signature,
    archetype: usize,
    row: usize,
}

impl<'a> Iterator for Query<'a> {
    type Item = RowView<'a>;

    fn next(&mut self) -> Option<RowView<'a>> {
        while self.archetype < self.node.archetypes.len() {
            let archetype = &self.node.archetypes[self.archetype];
            if self.row == 0 && !archetype.signature().contains_all(self.required.tags()) {
                self.archetype += 1;
                continue;
            }
            if self.row < archetype.len() {
                let view = archetype.row(self.row);
                self.row += 1;
                return Some(view);
            }
            self.archetype += 1;
            self.row = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS_A: [u8; 64] = [0xaa; 64];
    const POS_B: [u8; 64] = [0xbb; 64];

    fn ids(query: Query<'_>) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = query.map(|row| row.entity()).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn insert_then_query_returns_each_entity_once() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Position, &POS_A)]).unwrap();
        node.insert(EntityId(2), &[(ComponentTag::Position, &POS_B), (ComponentTag::Name, b"elm")])
            .unwrap();
        node.insert(EntityId(3), &[(ComponentTag::Name, b"oak")]).unwrap();

        assert_eq!(ids(node.query(&[ComponentTag::Position])), vec![EntityId(1), EntityId(2)]);
        assert_eq!(ids(node.query(&[ComponentTag::Name])), vec![EntityId(2), EntityId(3)]);
        assert_eq!(
            ids(node.query(&[ComponentTag::Position, ComponentTag::Name])),
            vec![EntityId(2)]
        );
        assert_eq!(ids(node.query(&[])), vec![EntityId(1), EntityId(2), EntityId(3)]);
    }

    #[test]
    fn duplicate_entity_is_rejected_without_mutation() {
        let mut node = EntityNode::new();
        node.insert(EntityId(7), &[(ComponentTag::Name, b"fern")]).unwrap();
        let err = node.insert(EntityId(7), &[(ComponentTag::Position, &POS_A)]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntity(EntityId(7))));
        assert_eq!(node.entity_count(), 1);
        assert_eq!(node.component(EntityId(7), ComponentTag::Name), Some(b"fern".as_slice()));
        assert_eq!(node.component(EntityId(7), ComponentTag::Position), None);
    }

    #[test]
    fn duplicate_tag_in_one_insert_is_rejected() {
        let mut node = EntityNode::new();
        let err = node
            .insert(EntityId(1), &[(ComponentTag::Name, b"a"), (ComponentTag::Name, b"b")])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateComponentTag(ComponentTag::Name)));
        assert_eq!(node.entity_count(), 0);
    }

    #[test]
    fn fixed_payload_sizes_are_enforced_before_any_change() {
        let mut node = EntityNode::new();
        let err = node
            .insert(EntityId(1), &[(ComponentTag::Position, b"short".as_slice())])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ComponentSizeMismatch { tag: ComponentTag::Position, expected: 64, actual: 5 }
        ));
        assert_eq!(node.entity_count(), 0);

        node.insert(EntityId(1), &[(ComponentTag::Position, &POS_A)]).unwrap();
        let err = node.set_component(EntityId(1), ComponentTag::CharacterState, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, StoreError::ComponentSizeMismatch { .. }));
        // The failed set did not migrate the entity.
        assert_eq!(node.archetypes().len(), 1);
        assert_eq!(node.component(EntityId(1), ComponentTag::Position), Some(POS_A.as_slice()));
    }

    #[test]
    fn set_component_in_place_keeps_the_archetype() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Position, &POS_A)]).unwrap();
        node.set_component(EntityId(1), ComponentTag::Position, &POS_B).unwrap();
        assert_eq!(node.archetypes().len(), 1);
        assert_eq!(node.component(EntityId(1), ComponentTag::Position), Some(POS_B.as_slice()));
    }

    #[test]
    fn adding_a_component_migrates_to_exactly_one_archetype() {
        let mut node = EntityNode::new();
        node.insert(EntityId(7), &[(ComponentTag::Position, &POS_A)]).unwrap();
        node.set_component(EntityId(7), ComponentTag::Name, b"x").unwrap();

        // The {Position} archetype emptied and was pruned.
        assert_eq!(node.archetypes().len(), 1);
        let signature = node.archetypes()[0].signature();
        assert_eq!(signature.tags(), &[ComponentTag::Position, ComponentTag::Name]);
        assert_eq!(node.component(EntityId(7), ComponentTag::Position), Some(POS_A.as_slice()));
        assert_eq!(node.component(EntityId(7), ComponentTag::Name), Some(b"x".as_slice()));
    }

    #[test]
    fn migration_preserves_untouched_bytes_and_neighbors() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Position, &POS_A), (ComponentTag::Name, b"ash")])
            .unwrap();
        node.insert(EntityId(2), &[(ComponentTag::Position, &POS_B), (ComponentTag::Name, b"elm")])
            .unwrap();
        node.insert(EntityId(3), &[(ComponentTag::Position, &POS_A), (ComponentTag::Name, b"oak")])
            .unwrap();

        // Migrate the middle entity out; 3 gets displaced into row 1.
        node.set_component(EntityId(2), ComponentTag::CharacterState, &[9u8; 28]).unwrap();

        assert_eq!(node.component(EntityId(1), ComponentTag::Name), Some(b"ash".as_slice()));
        assert_eq!(node.component(EntityId(2), ComponentTag::Name), Some(b"elm".as_slice()));
        assert_eq!(node.component(EntityId(2), ComponentTag::Position), Some(POS_B.as_slice()));
        assert_eq!(node.component(EntityId(2), ComponentTag::CharacterState), Some([9u8; 28].as_slice()));
        assert_eq!(node.component(EntityId(3), ComponentTag::Name), Some(b"oak".as_slice()));
        assert_eq!(node.entity_count(), 3);
    }

    #[test]
    fn alternating_edits_converge_to_the_net_signature() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Position, &POS_A)]).unwrap();
        node.set_component(EntityId(1), ComponentTag::Name, b"a").unwrap();
        node.remove_component(EntityId(1), ComponentTag::Name).unwrap();
        node.set_component(EntityId(1), ComponentTag::Name, b"b").unwrap();
        node.set_component(EntityId(1), ComponentTag::CharacterState, &[1u8; 28]).unwrap();
        node.remove_component(EntityId(1), ComponentTag::CharacterState).unwrap();

        assert_eq!(node.archetypes().len(), 1);
        assert_eq!(
            node.archetypes()[0].signature().tags(),
            &[ComponentTag::Position, ComponentTag::Name]
        );
        assert_eq!(node.component(EntityId(1), ComponentTag::Name), Some(b"b".as_slice()));
        assert_eq!(node.component(EntityId(1), ComponentTag::Position), Some(POS_A.as_slice()));
    }

    #[test]
    fn removing_the_last_component_deletes_the_entity() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Name, b"moss")]).unwrap();
        node.remove_component(EntityId(1), ComponentTag::Name).unwrap();
        assert!(!node.contains(EntityId(1)));
        assert_eq!(node.archetypes().len(), 0);
        // A later insert of the same ID is fresh, not a duplicate.
        node.insert(EntityId(1), &[(ComponentTag::Name, b"lichen")]).unwrap();
        assert_eq!(node.component(EntityId(1), ComponentTag::Name), Some(b"lichen".as_slice()));
    }

    #[test]
    fn missing_component_removal_is_an_error() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Name, b"moss")]).unwrap();
        let err = node.remove_component(EntityId(1), ComponentTag::Position).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingComponent { entity: EntityId(1), tag: ComponentTag::Position }
        ));
    }

    #[test]
    fn remove_repairs_the_displaced_row() {
        let mut node = EntityNode::new();
        for id in 1..=4u64 {
            node.insert(EntityId(id), &[(ComponentTag::Name, format!("e{id}").as_bytes())])
                .unwrap();
        }
        node.remove(EntityId(1)).unwrap();
        // Entity 4 was swapped into row 0; its components must still resolve.
        assert_eq!(node.component(EntityId(4), ComponentTag::Name), Some(b"e4".as_slice()));
        assert_eq!(node.component(EntityId(2), ComponentTag::Name), Some(b"e2".as_slice()));
        assert_eq!(node.entity_count(), 3);
        assert!(matches!(node.remove(EntityId(1)), Err(StoreError::UnknownEntity(_))));
    }

    #[test]
    fn operations_on_absent_entities_fail() {
        let mut node = EntityNode::new();
        assert!(matches!(node.remove(EntityId(9)), Err(StoreError::UnknownEntity(_))));
        assert!(matches!(
            node.set_component(EntityId(9), ComponentTag::Name, b"x"),
            Err(StoreError::UnknownEntity(_))
        ));
        assert!(matches!(
            node.remove_component(EntityId(9), ComponentTag::Name),
            Err(StoreError::UnknownEntity(_))
        ));
    }

    #[test]
    fn query_is_restartable() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Name, b"a")]).unwrap();
        node.insert(EntityId(2), &[(ComponentTag::Name, b"b")]).unwrap();
        let first = ids(node.query(&[ComponentTag::Name]));
        let second = ids(node.query(&[ComponentTag::Name]));
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_tags_can_be_carried_through_the_api() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[(ComponentTag::Unknown(50), b"opaque")]).unwrap();
        assert_eq!(node.component(EntityId(1), ComponentTag::Unknown(50)), Some(b"opaque".as_slice()));
        assert_eq!(ids(node.query(&[ComponentTag::Unknown(50)])), vec![EntityId(1)]);
    }

    #[test]
    fn entity_with_no_components_is_allowed() {
        let mut node = EntityNode::new();
        node.insert(EntityId(1), &[]).unwrap();
        assert!(node.contains(EntityId(1)));
        assert_eq!(ids(node.query(&[])), vec![EntityId(1)]);
        node.set_component(EntityId(1), ComponentTag::Name, b"grew").unwrap();
        assert_eq!(node.component(EntityId(1), ComponentTag::Name), Some(b"grew".as_slice()));
    }
}
