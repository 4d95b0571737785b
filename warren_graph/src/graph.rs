// Node arena and path resolution.
//
// The world graph is sparse and unbounded: nodes exist only once something
// touches them. `Graph` is an arena of discovered nodes plus the machinery
// that makes discovery canonical. The honeycomb has cycles — `[a, b]` and
// `[b, a]` are the same cell when the sides are adjacent — so identity
// cannot come from paths. Instead every node carries a stable `NodeKey`
// (see `key.rs`) and the arena guarantees at most one node per key.
//
// Canonicalization works by construction order. Before a new node is
// created, every neighbor of it that lies *closer* to the origin is
// materialized and linked first (`insert_child`). The canonical parent is
// then the closer neighbor with the smallest key, and the new key is
// derived from it. Because the set of closer neighbors is a structural
// property of the node — not of the walk that found it — keys come out
// identical across sessions and across exploration orders.
//
// Resolution (`resolve`) is incremental: one `ensure_neighbor` per path
// entry. A shared path prefix therefore resolves once per session, and
// re-resolving any path is pure cache lookup.
//
// **Critical constraint: key stability.** On-disk node addresses are keys.
// Anything that changes which parent is canonical, the key mix, or the
// order in which closer neighbors are populated silently orphans every
// existing world directory.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::dodeca::{SIDE_COUNT, Side};
use crate::key::NodeKey;
use crate::path::{GraphError, Path};

/// Session-local arena index of a discovered node. Not stable across
/// sessions; use `Graph::key` for a persistent identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct NodeData {
    key: NodeKey,
    /// Graph distance from the origin.
    length: u32,
    /// Side and node this one was first discovered from; `None` for the
    /// origin. Any closer neighbor works for routing — this one is just
    /// guaranteed to exist.
    parent: Option<(Side, NodeId)>,
    neighbors: [Option<NodeId>; SIDE_COUNT],
}

/// Arena of discovered graph nodes with canonical-key deduplication.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<NodeData>,
    by_key: FxHashMap<NodeKey, NodeId>,
}

impl Graph {
    /// The origin node, present in every graph.
    pub const ORIGIN: NodeId = NodeId(0);

    pub fn new() -> Graph {
        let origin = NodeData {
            key: NodeKey::ORIGIN,
            length: 0,
            parent: None,
            neighbors: [None; SIDE_COUNT],
        };
        let mut by_key = FxHashMap::default();
        by_key.insert(NodeKey::ORIGIN, Self::ORIGIN);
        Graph {
            nodes: vec![origin],
            by_key,
        }
    }

    /// Number of discovered nodes, the origin included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stable key of a discovered node.
    pub fn key(&self, node: NodeId) -> NodeKey {
        self.nodes[node.idx()].key
    }

    /// Graph distance of a node from the origin.
    pub fn length(&self, node: NodeId) -> u32 {
        self.nodes[node.idx()].length
    }

    /// Already-discovered neighbor of `node` through `side`, if any.
    pub fn neighbor(&self, node: NodeId, side: Side) -> Option<NodeId> {
        self.nodes[node.idx()].neighbors[side.index()]
    }

    /// Side and node `node` was first discovered from; `None` for the origin.
    pub fn parent(&self, node: NodeId) -> Option<(Side, NodeId)> {
        self.nodes[node.idx()].parent
    }

    /// Arena id for a key, if that node has been discovered this session.
    pub fn lookup(&self, key: NodeKey) -> Option<NodeId> {
        self.by_key.get(&key).copied()
    }

    /// Walk a whole path from the origin, materializing as needed.
    pub fn resolve(&mut self, path: &Path) -> NodeId {
        let mut node = Self::ORIGIN;
        for &side in path.sides() {
            node = self.ensure_neighbor(node, side);
        }
        node
    }

    /// Validate raw edge indices, then walk them. The path is fully
    /// validated before the graph is touched.
    pub fn resolve_indices(&mut self, indices: &[u8]) -> Result<NodeId, GraphError> {
        let path = Path::from_indices(indices)?;
        Ok(self.resolve(&path))
    }

    /// The neighbor of `node` through `side`, discovering it if necessary.
    pub fn ensure_neighbor(&mut self, node: NodeId, side: Side) -> NodeId {
        if let Some(found) = self.neighbor(node, side) {
            return found;
        }
        let Some((parent_side, parent)) = self.nodes[node.idx()].parent else {
            // The origin has no closer neighbors; everything new is a child.
            return self.insert_child(node, side);
        };
        // The sought neighbor is closer to the origin exactly when `side`
        // commutes with the step that reached `node` and the parent itself
        // steps closer through `side`. In that case node->side and
        // parent->side->parent_side land on the same cell.
        if side.adjacent_to(parent_side) {
            if let Some(across) = self.near_neighbor(parent, side) {
                let neighbor = self.ensure_neighbor(across, parent_side);
                self.link(node, neighbor, side);
                return neighbor;
            }
        }
        self.insert_child(node, side)
    }

    /// Neighbor of `node` through `side` if it exists and is closer to the
    /// origin than `node`.
    fn near_neighbor(&self, node: NodeId, side: Side) -> Option<NodeId> {
        let data = &self.nodes[node.idx()];
        let neighbor = data.neighbors[side.index()]?;
        if self.nodes[neighbor.idx()].length < data.length {
            Some(neighbor)
        } else {
            None
        }
    }

    /// Create the not-yet-existing neighbor of `parent` through `side`.
    ///
    /// Every neighbor of the new node that is closer to the origin is
    /// materialized first; the new node links to all of them immediately.
    /// This keeps the arena invariant that closer neighbors always exist,
    /// which in turn is what makes `near_neighbor` answers — and therefore
    /// canonical keys — independent of exploration order.
    fn insert_child(&mut self, parent: NodeId, side: Side) -> NodeId {
        let mut closer: SmallVec<[(Side, NodeId); 4]> = SmallVec::new();
        closer.push((side, parent));
        for other in Side::iter() {
            if other == side || !other.adjacent_to(side) {
                continue;
            }
            // The child steps closer through `other` exactly when the
            // parent does; the closer neighbor there is that cell's child
            // through `side`.
            if let Some(across) = self.near_neighbor(parent, other) {
                let neighbor = self.ensure_neighbor(across, side);
                closer.push((other, neighbor));
            }
        }

        let mut canonical = (side, parent);
        for &(via, node) in &closer {
            if self.nodes[node.idx()].key < self.nodes[canonical.1.idx()].key {
                canonical = (via, node);
            }
        }
        let key = self.nodes[canonical.1.idx()].key.child(canonical.0);
        debug_assert!(
            !self.by_key.contains_key(&key),
            "canonical key collision for a fresh node"
        );

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            key,
            length: self.nodes[parent.idx()].length + 1,
            parent: Some((side, parent)),
            neighbors: [None; SIDE_COUNT],
        });
        self.by_key.insert(key, id);
        for (via, node) in closer {
            self.link(id, node, via);
        }
        id
    }

    /// Record that `a` and `b` are neighbors through `side`, both ways.
    /// Sides are self-inverse, so the same side indexes both directions.
    fn link(&mut self, a: NodeId, b: NodeId, side: Side) {
        self.nodes[a.idx()].neighbors[side.index()] = Some(b);
        self.nodes[b.idx()].neighbors[side.index()] = Some(a);
    }
}

impl Default for Graph {
    fn default() -> Graph {
        Graph::new()
    }
}
