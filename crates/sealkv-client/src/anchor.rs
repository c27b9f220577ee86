//! Trust anchor state and its persistence contract.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealkv_merkle::Digest;
use sealkv_verify::TrustedBase;

/// The client's last cryptographically confirmed view of the ledger.
///
/// Exactly one anchor is live per logical database connection. It is
/// created by the first successful verified operation (or restored from a
/// store), advances only after a full proof success, and never regresses:
/// `tx_id` is monotonically non-decreasing across the anchor's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchor {
    /// Database this anchor belongs to; anchors never carry over to another
    pub database: String,
    /// Last verified transaction
    pub tx_id: u64,
    /// Tree size at the last verified transaction
    pub tree_size: u64,
    /// Root digest the client confirmed for `tree_size`
    pub root: Digest,
    /// Server public key pinned at session start, if any. Signature checks
    /// over roots are layered above the coordinator; the key rides along so
    /// a deployment can enable them without a state migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Vec<u8>>,
}

impl TrustAnchor {
    /// The (size, root) pair consistency proofs are checked against.
    pub fn trusted_base(&self) -> TrustedBase {
        TrustedBase {
            tree_size: self.tree_size,
            root: self.root,
        }
    }
}

/// Error types for anchor persistence
#[derive(Error, Debug)]
pub enum AnchorStoreError {
    /// Underlying storage failure
    #[error("failed to access anchor storage: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted anchor could not be decoded
    #[error("failed to decode persisted anchor: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Load/save contract for carrying an anchor across sessions.
pub trait AnchorStore: Send + Sync {
    /// Load the persisted anchor, `None` if nothing was persisted yet.
    fn load(&self) -> Result<Option<TrustAnchor>, AnchorStoreError>;

    /// Persist `anchor`, replacing any previous one.
    fn save(&self, anchor: &TrustAnchor) -> Result<(), AnchorStoreError>;
}

/// JSON-file-backed anchor store.
///
/// Writes go to a temporary sibling file and are renamed into place, so a
/// crash mid-save leaves the previous anchor intact.
#[derive(Debug, Clone)]
pub struct FileAnchorStore {
    path: PathBuf,
}

impl FileAnchorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnchorStore for FileAnchorStore {
    fn load(&self) -> Result<Option<TrustAnchor>, AnchorStoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, anchor: &TrustAnchor) -> Result<(), AnchorStoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(anchor)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory anchor store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryAnchorStore {
    slot: Mutex<Option<TrustAnchor>>,
}

impl AnchorStore for MemoryAnchorStore {
    fn load(&self) -> Result<Option<TrustAnchor>, AnchorStoreError> {
        Ok(self.slot.lock().expect("anchor store lock poisoned").clone())
    }

    fn save(&self, anchor: &TrustAnchor) -> Result<(), AnchorStoreError> {
        *self.slot.lock().expect("anchor store lock poisoned") = Some(anchor.clone());
        Ok(())
    }
}
