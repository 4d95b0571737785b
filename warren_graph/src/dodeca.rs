// Dodecahedral cell topology.
//
// Every cell of the world graph is a dodecahedron: 12 faces (`Side`), 30
// edges, 20 corners (`Vertex`). Traversal steps through a face into the
// neighboring cell, so a path entry is a `Side`; voxel chunks attach to
// corners, so a chunk slot is a `Vertex`.
//
// The labeling follows the face rings of a dodecahedron resting on a face:
// one top cap, an upper ring of five, a lower ring of five, one bottom cap.
// Adjacency is the pentagon edge-sharing relation of that layout, baked into
// const tables below. Two properties of the honeycomb built from these cells
// matter to the rest of the crate:
//
// - Stepping through the same side twice returns to the starting cell
//   (sides are self-inverse).
// - Steps through two *adjacent* sides commute: `[a, b]` and `[b, a]` reach
//   the same cell. Steps through non-adjacent sides do not.
//
// `graph.rs` leans on both to deduplicate cells reachable by multiple paths.
//
// See also: `graph.rs` for the node arena, `path.rs` for validated
// traversal sequences.

/// Number of faces of a dodecahedral cell; the valence of the world graph.
pub const SIDE_COUNT: usize = 12;

/// Number of corners of a dodecahedral cell; the chunk slots per cell.
pub const VERTEX_COUNT: usize = 20;

/// One face of a dodecahedral cell, and therefore one traversal direction.
///
/// Discriminants are the wire edge indices (0..12): `Top` = 0, the upper
/// ring = 1..=5, the lower ring = 6..=10, `Bottom` = 11.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Side {
    Top,
    UpperA,
    UpperB,
    UpperC,
    UpperD,
    UpperE,
    LowerA,
    LowerB,
    LowerC,
    LowerD,
    LowerE,
    Bottom,
}

use Side::*;

/// The five faces sharing an edge with each face, indexed by `Side`.
///
/// Caps touch their whole ring; a ring face touches its cap, its two ring
/// neighbors, and two faces of the other ring.
const NEIGHBORS: [[Side; 5]; SIDE_COUNT] = [
    [UpperA, UpperB, UpperC, UpperD, UpperE], // Top
    [Top, UpperE, UpperB, LowerA, LowerB],    // UpperA
    [Top, UpperA, UpperC, LowerB, LowerC],    // UpperB
    [Top, UpperB, UpperD, LowerC, LowerD],    // UpperC
    [Top, UpperC, UpperE, LowerD, LowerE],    // UpperD
    [Top, UpperD, UpperA, LowerE, LowerA],    // UpperE
    [Bottom, LowerE, LowerB, UpperE, UpperA], // LowerA
    [Bottom, LowerA, LowerC, UpperA, UpperB], // LowerB
    [Bottom, LowerB, LowerD, UpperB, UpperC], // LowerC
    [Bottom, LowerC, LowerE, UpperC, UpperD], // LowerD
    [Bottom, LowerD, LowerA, UpperD, UpperE], // LowerE
    [LowerA, LowerB, LowerC, LowerD, LowerE], // Bottom
];

const fn build_adjacency() -> [[bool; SIDE_COUNT]; SIDE_COUNT] {
    let mut table = [[false; SIDE_COUNT]; SIDE_COUNT];
    let mut side = 0;
    while side < SIDE_COUNT {
        let mut n = 0;
        while n < 5 {
            table[side][NEIGHBORS[side][n] as usize] = true;
            n += 1;
        }
        side += 1;
    }
    table
}

/// Symmetric edge-sharing relation, derived from `NEIGHBORS` at compile time.
static ADJACENT: [[bool; SIDE_COUNT]; SIDE_COUNT] = build_adjacency();

impl Side {
    /// Every side, in discriminant order.
    pub const ALL: [Side; SIDE_COUNT] = [
        Top, UpperA, UpperB, UpperC, UpperD, UpperE, LowerA, LowerB, LowerC, LowerD, LowerE,
        Bottom,
    ];

    /// Iterate all sides in discriminant order.
    pub fn iter() -> impl Iterator<Item = Side> {
        Self::ALL.into_iter()
    }

    /// The wire edge index of this side (0..12).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Side for a wire edge index, `None` if out of range.
    pub fn from_index(index: u8) -> Option<Side> {
        Self::ALL.get(index as usize).copied()
    }

    /// Whether `self` and `other` share an edge. A side is never adjacent
    /// to itself.
    pub fn adjacent_to(self, other: Side) -> bool {
        ADJACENT[self.index()][other.index()]
    }

    /// The five sides sharing an edge with this one.
    pub fn neighbors(self) -> [Side; 5] {
        NEIGHBORS[self.index()]
    }
}

/// One corner of a dodecahedral cell: the meet of three mutually adjacent
/// faces. Chunks attach to vertices, at most one per vertex.
///
/// Variants are plain letters; the triple of faces forming each corner is
/// in `Vertex::sides`. `A..=E` ring the top cap, `F..=J` and `K..=O` form
/// the equatorial band, `P..=T` ring the bottom cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Vertex {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
}

/// The face triple meeting at each vertex, indexed by `Vertex`.
const VERTEX_SIDES: [[Side; 3]; VERTEX_COUNT] = [
    [Top, UpperA, UpperB],      // A
    [Top, UpperB, UpperC],      // B
    [Top, UpperC, UpperD],      // C
    [Top, UpperD, UpperE],      // D
    [Top, UpperE, UpperA],      // E
    [UpperA, UpperB, LowerB],   // F
    [UpperB, UpperC, LowerC],   // G
    [UpperC, UpperD, LowerD],   // H
    [UpperD, UpperE, LowerE],   // I
    [UpperE, UpperA, LowerA],   // J
    [UpperA, LowerA, LowerB],   // K
    [UpperB, LowerB, LowerC],   // L
    [UpperC, LowerC, LowerD],   // M
    [UpperD, LowerD, LowerE],   // N
    [UpperE, LowerE, LowerA],   // O
    [Bottom, LowerA, LowerB],   // P
    [Bottom, LowerB, LowerC],   // Q
    [Bottom, LowerC, LowerD],   // R
    [Bottom, LowerD, LowerE],   // S
    [Bottom, LowerE, LowerA],   // T
];

impl Vertex {
    /// Every vertex, in discriminant order.
    pub const ALL: [Vertex; VERTEX_COUNT] = [
        Vertex::A,
        Vertex::B,
        Vertex::C,
        Vertex::D,
        Vertex::E,
        Vertex::F,
        Vertex::G,
        Vertex::H,
        Vertex::I,
        Vertex::J,
        Vertex::K,
        Vertex::L,
        Vertex::M,
        Vertex::N,
        Vertex::O,
        Vertex::P,
        Vertex::Q,
        Vertex::R,
        Vertex::S,
        Vertex::T,
    ];

    /// Iterate all vertices in discriminant order.
    pub fn iter() -> impl Iterator<Item = Vertex> {
        Self::ALL.into_iter()
    }

    /// The wire vertex index (0..20).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Vertex for a wire index, `None` if out of range.
    pub fn from_index(index: u8) -> Option<Vertex> {
        Self::ALL.get(index as usize).copied()
    }

    /// The three mutually adjacent faces meeting at this corner.
    pub fn sides(self) -> [Side; 3] {
        VERTEX_SIDES[self.index()]
    }
}
