// Traversal paths.
//
// A `Path` is an ordered sequence of sides walked from the origin node.
// Paths are how callers address nodes and how character records point at
// their home node; they are validated at construction so that raw edge
// indices from disk or from callers fail fast here rather than deep in
// graph resolution.

use smallvec::SmallVec;
use thiserror::Error;

use crate::dodeca::Side;

/// Traversal errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// An edge index outside `0..12` at the given position of a path.
    #[error("invalid traversal: edge index {index} at position {position}, valence is 12")]
    InvalidTraversal { index: u8, position: usize },
}

/// An ordered sequence of edge traversals from the origin.
///
/// Short paths are the common case; the inline capacity covers the working
/// depth of a session without heap allocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Side; 16]>);

impl Path {
    /// The empty path, addressing the origin node.
    pub fn new() -> Path {
        Path(SmallVec::new())
    }

    /// Validate a sequence of raw edge indices. Fails with
    /// `InvalidTraversal` on the first out-of-range entry, reporting its
    /// position; nothing is partially constructed.
    pub fn from_indices(indices: &[u8]) -> Result<Path, GraphError> {
        let mut sides = SmallVec::with_capacity(indices.len());
        for (position, &index) in indices.iter().enumerate() {
            match Side::from_index(index) {
                Some(side) => sides.push(side),
                None => return Err(GraphError::InvalidTraversal { index, position }),
            }
        }
        Ok(Path(sides))
    }

    /// Append one step.
    pub fn push(&mut self, side: Side) {
        self.0.push(side);
    }

    /// The steps of this path, in walk order.
    pub fn sides(&self) -> &[Side] {
        &self.0
    }

    /// The raw edge indices of this path, the on-disk form.
    pub fn indices(&self) -> Vec<u8> {
        self.0.iter().map(|s| s.index() as u8).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[Side]> for Path {
    fn from(sides: &[Side]) -> Path {
        Path(sides.iter().copied().collect())
    }
}

impl<const N: usize> From<[Side; N]> for Path {
    fn from(sides: [Side; N]) -> Path {
        Path(sides.into_iter().collect())
    }
}

impl FromIterator<Side> for Path {
    fn from_iter<I: IntoIterator<Item = Side>>(iter: I) -> Path {
        Path(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_indices_accepts_full_valence() {
        let indices: Vec<u8> = (0..12).collect();
        let path = Path::from_indices(&indices).unwrap();
        assert_eq!(path.len(), 12);
        assert_eq!(path.indices(), indices);
    }

    #[test]
    fn from_indices_reports_position_of_bad_entry() {
        let err = Path::from_indices(&[0, 3, 12, 1]).unwrap_err();
        assert_eq!(
            err,
            GraphError::InvalidTraversal {
                index: 12,
                position: 2
            }
        );
    }

    #[test]
    fn empty_path_is_the_origin_address() {
        let path = Path::from_indices(&[]).unwrap();
        assert!(path.is_empty());
        assert_eq!(path, Path::new());
    }

    #[test]
    fn push_extends_the_walk() {
        let mut path = Path::new();
        path.push(Side::Top);
        path.push(Side::UpperA);
        assert_eq!(path.sides(), &[Side::Top, Side::UpperA]);
        assert_eq!(path.indices(), vec![0, 1]);
    }
}
