//! Merkle accumulator primitives for the sealkv ledger protocol
//!
//! This crate provides the building blocks shared by the proof verifier and
//! the client: the digest value type, the canonical leaf/node hashing rules,
//! audit path shapes, and an in-memory reference tree used to generate proof
//! material in tests and offline tooling.

pub mod digest;
pub mod hash;
pub mod path;
pub mod tree;

pub use digest::{Digest, DigestError, DIGEST_LEN};
pub use hash::{empty_tree_digest, leaf_digest, node_digest, LeafInput};
pub use path::{expected_path_len, expected_sides, AuditPath, PathStep, Side};
pub use tree::{MemoryTree, TreeError};
