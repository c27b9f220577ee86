//! Proof bundle and verified-result types exchanged with the transport
//! layer.
//!
//! There is exactly one canonical bundle shape for both reads and writes;
//! older transport formats are adapted at the transport boundary, never
//! here. Every field is statically declared — no generic object population.

use serde::{Deserialize, Serialize};

use sealkv_merkle::{AuditPath, Digest, LeafInput, MemoryTree, TreeError};

/// Proof material accompanying one verified read or write, as handed over
/// by the transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Raw key of the entry being proven
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    /// Raw value of the entry being proven
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
    /// Transaction that committed this entry (leaf metadata)
    pub entry_tx_id: u64,
    /// Total ledger entry count at the time of the entry's write (leaf
    /// metadata)
    pub entry_count: u64,
    /// Transaction the claimed state corresponds to. For a write this is
    /// the write's own transaction; for a read it is the server's latest
    /// transaction at proof time, which may be newer than `entry_tx_id`.
    pub tx_id: u64,
    /// Position of the entry's leaf in the claimed tree
    pub leaf_index: u64,
    /// Size of the tree the proofs are rooted in
    pub tree_size: u64,
    /// Claimed root digest of the tree at `tree_size`
    pub root: Digest,
    /// Sibling path anchoring the leaf under `root`
    pub audit_path: AuditPath,
    /// Base size the server built the consistency proof from; must match
    /// the client's trusted size
    pub prior_size: u64,
    /// Root the server asserts for `prior_size`. Informational: the
    /// verifier always checks against the locally trusted root instead.
    pub prior_root: Digest,
    /// Append-only consistency proof from `prior_size` to `tree_size`
    pub consistency_proof: Vec<Digest>,
}

impl ProofBundle {
    /// Leaf material the expected digest is recomputed from.
    pub fn leaf_input(&self) -> LeafInput<'_> {
        LeafInput {
            key: &self.key,
            value: &self.value,
            tx_id: self.entry_tx_id,
            entry_count: self.entry_count,
        }
    }

    /// Build a bundle out of a reference tree, proving `entry` at
    /// `leaf_index` in the tree of `tree_size` leaves with consistency
    /// material since `prior_size`.
    ///
    /// This produces the same shapes an honest server emits; it backs the
    /// test suites and offline tooling.
    pub fn from_tree(
        tree: &MemoryTree,
        entry: &LeafInput,
        leaf_index: u64,
        tree_size: u64,
        prior_size: u64,
    ) -> Result<Self, TreeError> {
        Ok(Self {
            key: entry.key.to_vec(),
            value: entry.value.to_vec(),
            entry_tx_id: entry.tx_id,
            entry_count: entry.entry_count,
            // The reference builder commits one entry per transaction, so
            // the state transaction equals the leaf count.
            tx_id: tree_size,
            leaf_index,
            tree_size,
            root: tree.root_at(tree_size)?,
            audit_path: tree.audit_path(leaf_index, tree_size)?,
            prior_size,
            prior_root: tree.root_at(prior_size)?,
            consistency_proof: tree.consistency_proof(prior_size, tree_size)?,
        })
    }
}

/// Locally trusted (size, root) pair that consistency proofs are checked
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedBase {
    pub tree_size: u64,
    pub root: Digest,
}

/// Outcome of a verified read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedEntry {
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
    /// Transaction that committed the entry
    pub tx_id: u64,
    /// True iff inclusion and consistency checks both passed
    pub verified: bool,
}

/// Acknowledgement of a verified write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedWrite {
    /// Transaction that committed the write
    pub tx_id: u64,
    /// Leaf digest the entry was committed under
    pub leaf: Digest,
    /// True iff inclusion and consistency checks both passed
    pub verified: bool,
}
