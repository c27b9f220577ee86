//! sealkv client library
//!
//! Client-side trust verification for a remote append-only key-value
//! ledger. The coordinator re-derives leaf digests for returned entries,
//! checks inclusion and append-only consistency proofs, and advances a
//! persisted trust anchor only when everything verifies. The transport
//! layer is a seam: implementations fetch proof bundles over any channel
//! and hand them to the engine fully formed.

pub mod anchor;
pub mod coordinator;
pub mod inspect;
pub mod replay;
pub mod transport;

pub use anchor::{AnchorStore, AnchorStoreError, FileAnchorStore, MemoryAnchorStore, TrustAnchor};
pub use coordinator::{ClientError, VerificationCoordinator};
pub use transport::{LedgerTransport, Session, TransportError};

// Re-export the proof types callers exchange with transport implementations.
pub use sealkv_verify::{ProofBundle, VerifiedEntry, VerifiedWrite};
