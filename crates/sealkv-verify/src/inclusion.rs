//! Merkle inclusion proof verification.

use sealkv_merkle::{expected_path_len, expected_sides, node_digest, Digest, PathStep, Side};
use tracing::debug;

use crate::ProofError;

/// Check that `leaf` is anchored under `claimed_root` by the supplied audit
/// path.
///
/// The path length and sibling orientation are first cross-checked against
/// the pattern `(leaf_index, tree_size)` dictates; a length mismatch is a
/// protocol error, surfaced before any hashing. The path is then folded from
/// leaf level to root with the interior-node hash rule, and the result
/// compared to `claimed_root`.
///
/// Returns `Ok(false)` on any digest or orientation mismatch — callers treat
/// that as a tamper signal, not a transport retry condition.
pub fn verify_inclusion(
    leaf: &Digest,
    path: &[PathStep],
    claimed_root: &Digest,
    leaf_index: u64,
    tree_size: u64,
) -> Result<bool, ProofError> {
    if leaf_index >= tree_size {
        return Err(ProofError::IndexOutOfRange {
            index: leaf_index,
            size: tree_size,
        });
    }
    let expected = expected_path_len(leaf_index, tree_size);
    if path.len() != expected {
        return Err(ProofError::PathLength {
            expected,
            actual: path.len(),
        });
    }

    let sides = expected_sides(leaf_index, tree_size);
    let mut acc = *leaf;
    for (step, expected_side) in path.iter().zip(sides) {
        if step.side != expected_side {
            debug!(
                leaf_index,
                tree_size, "audit path orientation contradicts the claimed leaf position"
            );
            return Ok(false);
        }
        acc = match step.side {
            Side::Left => node_digest(&step.sibling, &acc),
            Side::Right => node_digest(&acc, &step.sibling),
        };
    }
    Ok(acc == *claimed_root)
}
