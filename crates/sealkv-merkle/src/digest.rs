//! Fixed-size digest value type used throughout the ledger protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of a protocol digest in bytes (SHA-256 output).
pub const DIGEST_LEN: usize = 32;

/// Error types for digest parsing
#[derive(Error, Debug)]
pub enum DigestError {
    /// Failed to decode hex input
    #[error("failed to decode hex digest: {0}")]
    Hex(#[from] hex::FromHexError),
    /// Decoded byte length is not [`DIGEST_LEN`]
    #[error("invalid digest length: expected {DIGEST_LEN} bytes, got {0}")]
    Length(usize),
}

/// A 256-bit digest committing to a leaf, an interior node, or a whole tree.
///
/// Equality is byte-exact. Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "hex::serde")] [u8; DIGEST_LEN]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(hex_str)?;
        let len = bytes.len();
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| DigestError::Length(len))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}
