// Stable structural node keys.
//
// A `NodeKey` identifies a graph node across sessions and on disk, unlike
// the session-local arena index `NodeId`. Keys are derived, not assigned:
// the origin has a fixed key, and every other node's key mixes its
// canonical parent's key with the side connecting them. `graph.rs` picks
// the canonical parent deterministically (the smallest-keyed neighbor
// closer to the origin), so the same physical node gets the same key no
// matter in which order the graph was explored — which is what lets keys
// double as external storage addresses.
//
// The mix is two chained splitmix64-style avalanche rounds, one per
// 64-bit lane. It is a hash, not a perfect encoding; 128 bits make
// collisions irrelevant in practice.

use std::fmt;

use crate::dodeca::Side;

/// Stable 128-bit structural identity of a graph node.
///
/// Displays as 32 hex digits, the form used for on-disk node file names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u128);

impl NodeKey {
    /// Key of the origin node. Fixed so that addresses are absolute.
    pub const ORIGIN: NodeKey = NodeKey(0);

    /// Key of the child reached from `self` through `side`, where `self`
    /// is the child's canonical parent.
    pub fn child(self, side: Side) -> NodeKey {
        let lo = mix64(self.0 as u64 ^ (side.index() as u64 + 1));
        let hi = mix64((self.0 >> 64) as u64 ^ lo);
        NodeKey(((hi as u128) << 64) | lo as u128)
    }

    /// Raw key value, for ordering and hashing by callers.
    pub fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse the 32-hex-digit form produced by `Display`.
    pub fn from_hex(text: &str) -> Option<NodeKey> {
        if text.len() != 32 {
            return None;
        }
        u128::from_str_radix(text, 16).ok().map(NodeKey)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({:032x})", self.0)
    }
}

/// splitmix64 finalizer: full-avalanche mix of one 64-bit lane.
fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_of_one_parent_are_distinct() {
        let mut keys: Vec<NodeKey> = Side::iter().map(|s| NodeKey::ORIGIN.child(s)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 12);
    }

    #[test]
    fn child_keys_are_deterministic() {
        for side in Side::iter() {
            assert_eq!(NodeKey::ORIGIN.child(side), NodeKey::ORIGIN.child(side));
        }
    }

    #[test]
    fn child_key_depends_on_parent() {
        let a = NodeKey::ORIGIN.child(Side::Top);
        let b = NodeKey::ORIGIN.child(Side::Bottom);
        assert_ne!(a.child(Side::UpperA), b.child(Side::UpperA));
    }

    #[test]
    fn hex_round_trips() {
        let key = NodeKey::ORIGIN.child(Side::UpperC).child(Side::LowerD);
        let text = key.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(NodeKey::from_hex(&text), Some(key));
    }

    #[test]
    fn from_hex_rejects_malformed_input() {
        assert_eq!(NodeKey::from_hex(""), None);
        assert_eq!(NodeKey::from_hex("abc"), None);
        assert_eq!(NodeKey::from_hex(&"g".repeat(32)), None);
    }
}
