//! Proof verification for the sealkv ledger
//!
//! This crate checks the proof material a ledger service returns with every
//! verified operation: that the entry's leaf digest is anchored under the
//! claimed root (inclusion), and that the claimed root is an append-only
//! extension of previously trusted history (consistency). All routines are
//! pure and deterministic; a failed check is a tamper signal, never a retry
//! condition.

use thiserror::Error;

pub mod bundle;
pub mod consistency;
pub mod inclusion;
pub mod verify;

pub use bundle::{ProofBundle, TrustedBase, VerifiedEntry, VerifiedWrite};
pub use consistency::verify_consistency;
pub use inclusion::verify_inclusion;
pub use verify::{verify_bundle, VerifyError};

/// Structural errors in server-supplied proof material.
///
/// These indicate a malformed bundle — a client/server protocol mismatch —
/// not a failed cryptographic check. They are surfaced before any hashing
/// and never retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProofError {
    /// Claimed leaf position does not exist in a tree of the claimed size
    #[error("leaf index {index} out of range for tree size {size}")]
    IndexOutOfRange { index: u64, size: u64 },
    /// Audit path length contradicts the claimed leaf position
    #[error("audit path has {actual} steps, expected {expected} for the claimed leaf position")]
    PathLength { expected: usize, actual: usize },
    /// Consistency proof length contradicts the claimed size pair
    #[error("consistency proof has {actual} nodes, expected {expected} for the claimed sizes")]
    ProofLength { expected: usize, actual: usize },
    /// Consistency proof was built from a different base than the trusted one
    #[error("consistency proof base size {bundle} does not match trusted size {trusted}")]
    BaseMismatch { bundle: u64, trusted: u64 },
}
