//! Canonical leaf and interior-node hashing for the ledger's Merkle tree.
//!
//! The byte layout below is part of the wire protocol and must reproduce the
//! server's tree construction bit-for-bit:
//!
//! ```text
//! leaf = SHA256( 0x00 || be64(tx_id) || be64(entry_count)
//!                     || be32(len(key))   || key
//!                     || be32(len(value)) || value )
//! node = SHA256( 0x01 || left || right )
//! ```
//!
//! Leaf and node digests use distinct domain prefixes so an interior node can
//! never be replayed as a leaf (or vice versa). The empty tree is committed
//! by `SHA256("")`.

use sha2::{Digest as _, Sha256};

use crate::digest::Digest;

/// Domain separation prefix for leaf digests
pub const LEAF_PREFIX: u8 = 0x00;

/// Domain separation prefix for interior node digests
pub const NODE_PREFIX: u8 = 0x01;

/// Everything that goes into a leaf digest: the entry itself plus the
/// transaction metadata the server committed it under.
///
/// All fields are required by construction, so a malformed input cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafInput<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
    /// Sequential transaction number assigned by the server
    pub tx_id: u64,
    /// Total number of ledger entries at the time of the write
    pub entry_count: u64,
}

impl LeafInput<'_> {
    /// Serialize to the canonical leaf byte layout (including the domain
    /// prefix).
    fn encode(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(1 + 8 + 8 + 4 + self.key.len() + 4 + self.value.len());
        buf.push(LEAF_PREFIX);
        buf.extend_from_slice(&self.tx_id.to_be_bytes());
        buf.extend_from_slice(&self.entry_count.to_be_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_be_bytes());
        buf.extend_from_slice(self.key);
        buf.extend_from_slice(&(self.value.len() as u32).to_be_bytes());
        buf.extend_from_slice(self.value);
        buf
    }
}

/// Compute the canonical leaf digest for a key/value entry.
pub fn leaf_digest(input: &LeafInput) -> Digest {
    Digest::new(Sha256::digest(input.encode()).into())
}

/// Combine two child digests into their parent node digest.
pub fn node_digest(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::new(hasher.finalize().into())
}

/// Digest of the empty tree.
pub fn empty_tree_digest() -> Digest {
    Digest::new(Sha256::digest([]).into())
}
