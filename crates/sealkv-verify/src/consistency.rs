//! Merkle consistency proof verification.
//!
//! A consistency proof shows that the tree of `new_size` leaves was produced
//! by only appending to the tree of `old_size` leaves. Both roots are
//! recomputed from a shared seed plus the proof nodes, following the path of
//! the old tree's rightmost leaf inside the new tree: the old-root
//! recomputation consumes only the nodes lying inside the old tree, the
//! new-root recomputation consumes every node. If both match their claimed
//! values, no previously committed leaf can have been altered or removed.

use sealkv_merkle::path::inner_path_len;
use sealkv_merkle::{node_digest, Digest};
use tracing::debug;

use crate::ProofError;

/// Check that `(new_size, new_root)` is an append-only extension of
/// `(old_size, old_root)`.
///
/// A shrinking tree fails immediately (rollback) without any hashing. Equal
/// sizes require bit-identical roots and ignore the proof body. A proof of
/// the wrong length for the claimed size pair is a protocol error. Any
/// digest mismatch returns `Ok(false)` — a tamper signal.
pub fn verify_consistency(
    old_size: u64,
    old_root: &Digest,
    new_size: u64,
    new_root: &Digest,
    proof: &[Digest],
) -> Result<bool, ProofError> {
    if new_size < old_size {
        debug!(old_size, new_size, "claimed tree shrank, rejecting as rollback");
        return Ok(false);
    }
    if old_size == new_size {
        return Ok(old_root == new_root);
    }
    if old_size == 0 {
        // Any tree extends the empty tree; there is no old history to link
        // the new root against. Callers handle this as trust-on-first-use.
        return Ok(true);
    }

    // Path decomposition of the old tree's rightmost leaf within the new
    // tree. The `shift` lowest levels are complete subtrees shared by both
    // trees and are never proven.
    let index = old_size - 1;
    let shift = old_size.trailing_zeros() as usize;
    let inner = inner_path_len(index, new_size) - shift;
    let border = (index >> (shift + inner)).count_ones() as usize;

    // When the old size is a power of two the old root itself seeds the
    // recomputation; otherwise the first proof node does.
    let (seed, rest) = if old_size == 1 << shift {
        (*old_root, proof)
    } else {
        match proof.split_first() {
            Some((seed, rest)) => (*seed, rest),
            None => {
                return Err(ProofError::ProofLength {
                    expected: inner + border + 1,
                    actual: 0,
                })
            }
        }
    };
    if rest.len() != inner + border {
        let prefix = proof.len() - rest.len();
        return Err(ProofError::ProofLength {
            expected: inner + border + prefix,
            actual: proof.len(),
        });
    }

    // Bits of `mask` say, level by level, whether the old path descends into
    // a right child (sibling inside the old tree) or a left child (sibling
    // appended after the old tree).
    let mask = index >> shift;

    let mut old_acc = seed;
    for (level, node) in rest[..inner].iter().enumerate() {
        if (mask >> level) & 1 == 1 {
            old_acc = node_digest(node, &old_acc);
        }
    }
    for node in &rest[inner..] {
        old_acc = node_digest(node, &old_acc);
    }
    if old_acc != *old_root {
        debug!(old_size, new_size, "recomputed old root does not match trusted root");
        return Ok(false);
    }

    let mut new_acc = seed;
    for (level, node) in rest[..inner].iter().enumerate() {
        if (mask >> level) & 1 == 1 {
            new_acc = node_digest(node, &new_acc);
        } else {
            new_acc = node_digest(&new_acc, node);
        }
    }
    for node in &rest[inner..] {
        new_acc = node_digest(node, &new_acc);
    }
    Ok(new_acc == *new_root)
}
