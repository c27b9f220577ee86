//! Audit path shapes and the index math pinning their expected length and
//! orientation.
//!
//! For a leaf at `index` in a tree of `size` leaves, the path from the leaf
//! to the root decomposes into two runs:
//!
//! - `inner = bitlen(index XOR (size - 1))` steps inside the perfect region
//!   of the tree, where the sibling side follows the bits of `index`;
//! - `border = popcount(index >> inner)` steps along the right border, where
//!   the sibling is always a completed subtree on the left.
//!
//! A server-supplied path whose length or orientation disagrees with this
//! decomposition cannot have been produced by an honest tree builder for the
//! claimed `(index, size)` pair.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Which side of the current node the sibling digest sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One step of an audit path: a sibling digest and its orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Ordered sibling sequence from leaf level to root.
pub type AuditPath = Vec<PathStep>;

/// Number of path steps inside the perfect region for `(index, size)`.
///
/// `index` must be less than `size`.
pub fn inner_path_len(index: u64, size: u64) -> usize {
    debug_assert!(index < size);
    bit_len(index ^ (size - 1))
}

/// Expected total audit path length for a leaf at `index` in a tree of
/// `size` leaves.
pub fn expected_path_len(index: u64, size: u64) -> usize {
    let inner = inner_path_len(index, size);
    inner + (index >> inner).count_ones() as usize
}

/// Expected sibling orientation at every path step for `(index, size)`,
/// ordered from leaf level to root.
pub fn expected_sides(index: u64, size: u64) -> Vec<Side> {
    let inner = inner_path_len(index, size);
    let border = (index >> inner).count_ones() as usize;
    let mut sides = Vec::with_capacity(inner + border);
    for level in 0..inner {
        // A set bit means the leaf sits in the right child at this level,
        // so the sibling is on the left.
        if (index >> level) & 1 == 1 {
            sides.push(Side::Left);
        } else {
            sides.push(Side::Right);
        }
    }
    // Border steps always merge a completed subtree from the left.
    sides.extend(std::iter::repeat(Side::Left).take(border));
    sides
}

fn bit_len(v: u64) -> usize {
    (u64::BITS - v.leading_zeros()) as usize
}
