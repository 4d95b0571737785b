// Per-node voxel chunk storage.
//
// A node carries up to twenty chunks, one per dodecahedral vertex. A
// vertex with no stored chunk falls back to procedural generation in the
// simulation; the store only records explicit overrides. Payloads are
// opaque here, already validated against the world's `chunk_size` by the
// caller (the world facade for API writes, the disk decoder for loads).

use warren_graph::{VERTEX_COUNT, Vertex};

/// All explicitly stored chunks of one graph node.
#[derive(Debug)]
pub struct VoxelNode {
    chunks: [Option<Box<[u8]>>; VERTEX_COUNT],
}

impl VoxelNode {
    pub fn new() -> VoxelNode {
        VoxelNode { chunks: std::array::from_fn(|_| None) }
    }

    /// Stored chunk at `vertex`, or `None` when the vertex is procedural.
    pub fn chunk(&self, vertex: Vertex) -> Option<&[u8]> {
        self.chunks[vertex.index()].as_deref()
    }

    /// Stores or overwrites the chunk at `vertex`.
    pub fn put_chunk(&mut self, vertex: Vertex, voxels: Vec<u8>) {
        self.chunks[vertex.index()] = Some(voxels.into_boxed_slice());
    }

    /// Removes the chunk at `vertex`, reverting it to procedural. Returns
    /// whether a chunk was present.
    pub fn remove_chunk(&mut self, vertex: Vertex) -> bool {
        self.chunks[vertex.index()].take().is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|chunk| chunk.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Option::is_none)
    }

    /// Stored chunks in vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (Vertex, &[u8])> {
        Vertex::iter().filter_map(|vertex| self.chunk(vertex).map(|chunk| (vertex, chunk)))
    }
}

impl Default for VoxelNode {
    fn default() -> VoxelNode {
        VoxelNode::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_is_byte_identical() {
        let mut node = VoxelNode::new();
        let payload: Vec<u8> = (0..64u16).flat_map(u16::to_le_bytes).collect();
        node.put_chunk(Vertex::C, payload.clone());
        assert_eq!(node.chunk(Vertex::C), Some(payload.as_slice()));
        assert_eq!(node.chunk(Vertex::D), None);
    }

    #[test]
    fn overwrite_replaces_the_payload() {
        let mut node = VoxelNode::new();
        node.put_chunk(Vertex::A, vec![1, 1]);
        node.put_chunk(Vertex::A, vec![2, 2]);
        assert_eq!(node.chunk(Vertex::A), Some([2u8, 2].as_slice()));
        assert_eq!(node.chunk_count(), 1);
    }

    #[test]
    fn remove_reverts_to_procedural() {
        let mut node = VoxelNode::new();
        node.put_chunk(Vertex::B, vec![7, 7]);
        assert!(node.remove_chunk(Vertex::B));
        assert_eq!(node.chunk(Vertex::B), None);
        assert!(!node.remove_chunk(Vertex::B));
        assert!(node.is_empty());
    }

    #[test]
    fn iter_walks_stored_vertices_in_order() {
        let mut node = VoxelNode::new();
        node.put_chunk(Vertex::T, vec![3]);
        node.put_chunk(Vertex::A, vec![1]);
        node.put_chunk(Vertex::J, vec![2]);
        let order: Vec<Vertex> = node.iter().map(|(vertex, _)| vertex).collect();
        assert_eq!(order, vec![Vertex::A, Vertex::J, Vertex::T]);
        assert_eq!(node.chunk_count(), 3);
    }
}
