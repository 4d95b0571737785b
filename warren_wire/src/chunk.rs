// Voxel chunk payload layout.
//
// Module overview: a chunk is a dense cube of 16-bit material tags,
// `chunk_size` voxels on a side, serialized as raw little-endian bytes
// with x varying fastest, then y, then z. The payload is opaque to the
// storage layer beyond its length, which must be exactly
// `chunk_size^3 * 2` bytes. Length is the only integrity check applied
// here; whatever the simulation packs into the tags passes through
// untouched.

use crate::WireError;

/// Bytes per voxel: one 16-bit material tag.
pub const VOXEL_WIDTH: usize = 2;

/// Exact byte length of a chunk payload for the given edge size.
pub fn chunk_byte_len(chunk_size: u16) -> usize {
    let edge = chunk_size as usize;
    edge * edge * edge * VOXEL_WIDTH
}

/// Validates a chunk payload length against the world's `chunk_size`.
pub fn check_chunk_len(chunk_size: u16, actual: usize) -> Result<(), WireError> {
    let expected = chunk_byte_len(chunk_size);
    if actual != expected {
        return Err(WireError::InvalidChunkSize { expected, actual });
    }
    Ok(())
}

/// Byte offset of the voxel at `(x, y, z)` within a chunk payload, or
/// `None` when any coordinate falls outside the cube.
pub fn voxel_offset(chunk_size: u16, x: u16, y: u16, z: u16) -> Option<usize> {
    if x >= chunk_size || y >= chunk_size || z >= chunk_size {
        return None;
    }
    let edge = chunk_size as usize;
    let index = x as usize + edge * (y as usize + edge * z as usize);
    Some(index * VOXEL_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_is_cubic_in_edge_size() {
        assert_eq!(chunk_byte_len(1), 2);
        assert_eq!(chunk_byte_len(12), 12 * 12 * 12 * 2);
        assert_eq!(chunk_byte_len(16), 8192);
    }

    #[test]
    fn off_by_one_payloads_are_rejected() {
        assert!(check_chunk_len(16, 8192).is_ok());
        let err = check_chunk_len(16, 8191).unwrap_err();
        assert!(matches!(err, WireError::InvalidChunkSize { expected: 8192, actual: 8191 }));
        assert!(check_chunk_len(16, 8193).is_err());
        assert!(check_chunk_len(16, 0).is_err());
    }

    #[test]
    fn x_varies_fastest() {
        assert_eq!(voxel_offset(4, 0, 0, 0), Some(0));
        assert_eq!(voxel_offset(4, 1, 0, 0), Some(2));
        assert_eq!(voxel_offset(4, 0, 1, 0), Some(8));
        assert_eq!(voxel_offset(4, 0, 0, 1), Some(32));
        assert_eq!(voxel_offset(4, 3, 3, 3), Some((4 * 4 * 4 - 1) * 2));
    }

    #[test]
    fn out_of_range_coordinates_are_none() {
        assert_eq!(voxel_offset(4, 4, 0, 0), None);
        assert_eq!(voxel_offset(4, 0, 4, 0), None);
        assert_eq!(voxel_offset(4, 0, 0, 4), None);
    }
}
