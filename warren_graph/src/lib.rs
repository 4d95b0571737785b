// warren_graph — dodecahedral world graph addressing.
//
// Space in a warren world is not a grid: it is a sparse, unbounded graph of
// dodecahedral cells, and a location is "the cell this walk from the origin
// reaches". This crate owns that addressing story and nothing else — no
// entities, no voxels, no I/O.
//
// Module overview:
// - `dodeca.rs`: Face (`Side`) and corner (`Vertex`) enums with the const
//                adjacency tables of a dodecahedral cell.
// - `key.rs`:    `NodeKey` — stable 128-bit structural identity, the form
//                nodes are addressed by on disk.
// - `path.rs`:   `Path` — validated sequences of edge traversals, plus
//                `GraphError`.
// - `graph.rs`:  `Graph` — the node arena, incremental resolution, and the
//                canonicalization that deduplicates cells reachable by more
//                than one path.
//
// The storage crate (`warren_store`) drives this one: it resolves paths to
// keys, then uses keys to address per-node payloads.

pub mod dodeca;
pub mod graph;
pub mod key;
pub mod path;

pub use dodeca::{SIDE_COUNT, Side, VERTEX_COUNT, Vertex};
pub use graph::{Graph, NodeId};
pub use key::NodeKey;
pub use path::{GraphError, Path};
