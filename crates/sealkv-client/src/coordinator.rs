//! Verification coordinator: the per-connection trust state machine.
//!
//! A coordinator starts **unanchored** after connecting to a database. The
//! first verified operation whose inclusion proof checks out anchors the
//! connection to that transaction's state — a trust-on-first-use point,
//! since no prior state exists to check consistency against; resuming from
//! a persisted anchor via [`VerificationCoordinator::load_anchor`] avoids
//! it. Once **anchored**, every verified operation must present state at
//! least as new as the anchor (older state is rejected as a possible
//! rollback before any hashing) and prove both leaf inclusion and
//! append-only consistency; only then does the anchor advance. A failed
//! proof never mutates the anchor, so a single forged response cannot
//! poison future checks.
//!
//! Verification itself is pure and synchronous: proofs are checked against
//! a snapshot of the anchor without holding any lock, and the advance is a
//! single compare-and-swap under a mutex. Parallel reads verify freely;
//! only the winning advance commits.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

use sealkv_merkle::leaf_digest;
use sealkv_verify::{
    verify_bundle, ProofBundle, ProofError, VerifiedEntry, VerifiedWrite, VerifyError,
};

use crate::anchor::{AnchorStore, AnchorStoreError, TrustAnchor};
use crate::transport::{LedgerTransport, Session, TransportError};

/// Error types for verified operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Malformed proof bundle — a client/server protocol mismatch, never
    /// retried
    #[error("protocol error: {0}")]
    Protocol(#[from] ProofError),
    /// The server echoed a different entry than the one requested
    #[error("protocol error: server answered for a different entry")]
    EntryMismatch,
    /// A cryptographic check failed: the server's data or history has been
    /// altered relative to trusted state. Surface as a security event; a
    /// retry against the same server state cannot succeed.
    #[error("tamper detected: {0}")]
    TamperDetected(VerifyError),
    /// The server presented state older than the trusted anchor — a
    /// possible rollback attack, rejected without any cryptographic work
    #[error(
        "stale transaction: server claims tx {claimed} at size {claimed_size}, \
         anchor is at tx {anchored} at size {anchored_size}"
    )]
    StaleTransaction {
        claimed: u64,
        claimed_size: u64,
        anchored: u64,
        anchored_size: u64,
    },
    /// Transport failure; retry at the caller's discretion
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Anchor persistence failure
    #[error("anchor store error: {0}")]
    AnchorStore(#[from] AnchorStoreError),
    /// A persisted anchor belongs to a different database
    #[error("persisted anchor belongs to database {persisted:?}, session targets {session:?}")]
    AnchorDatabaseMismatch { persisted: String, session: String },
    /// No trust anchor has been established yet
    #[error("no trust anchor established yet")]
    Unanchored,
}

fn map_verify_error(err: VerifyError) -> ClientError {
    match err {
        VerifyError::Proof(err) => ClientError::Protocol(err),
        err => ClientError::TamperDetected(err),
    }
}

/// Orchestrates proof verification for one logical database connection.
///
/// The coordinator owns the connection's trust anchor; the session context
/// is immutable for its lifetime. Switching databases means constructing a
/// new coordinator — anchors never carry over.
pub struct VerificationCoordinator<T> {
    transport: T,
    session: Session,
    anchor: Mutex<Option<TrustAnchor>>,
}

impl<T: LedgerTransport> VerificationCoordinator<T> {
    /// Create an unanchored coordinator for `session`.
    pub fn new(transport: T, session: Session) -> Self {
        Self {
            transport,
            session,
            anchor: Mutex::new(None),
        }
    }

    /// Snapshot of the current trust anchor, `None` while unanchored.
    pub fn current_anchor(&self) -> Option<TrustAnchor> {
        self.anchor.lock().expect("anchor lock poisoned").clone()
    }

    /// Resume trust from a persisted anchor instead of trust-on-first-use.
    ///
    /// Rejects anchors persisted for a different database. A persisted
    /// anchor older than the live one is ignored — trust never regresses.
    /// Returns the anchor that is live after the call.
    pub fn load_anchor(
        &self,
        store: &dyn AnchorStore,
    ) -> Result<Option<TrustAnchor>, ClientError> {
        let Some(persisted) = store.load()? else {
            return Ok(self.current_anchor());
        };
        if persisted.database != self.session.database {
            return Err(ClientError::AnchorDatabaseMismatch {
                persisted: persisted.database,
                session: self.session.database.clone(),
            });
        }
        let mut guard = self.anchor.lock().expect("anchor lock poisoned");
        match guard.as_ref() {
            Some(live) if live.tx_id >= persisted.tx_id => {
                debug!(
                    live = live.tx_id,
                    persisted = persisted.tx_id,
                    "keeping newer live anchor"
                );
            }
            _ => {
                info!(
                    tx_id = persisted.tx_id,
                    tree_size = persisted.tree_size,
                    "resuming trust from persisted anchor"
                );
                *guard = Some(persisted);
            }
        }
        Ok(guard.clone())
    }

    /// Persist the current anchor; fails while unanchored.
    pub fn save_anchor(&self, store: &dyn AnchorStore) -> Result<TrustAnchor, ClientError> {
        let anchor = self.current_anchor().ok_or(ClientError::Unanchored)?;
        store.save(&anchor)?;
        Ok(anchor)
    }

    /// Read `key` and verify the returned entry against trusted state.
    pub async fn verified_read(&self, key: &[u8]) -> Result<VerifiedEntry, ClientError> {
        let base = self.current_anchor();
        let since = base.as_ref().map(|a| a.tree_size).unwrap_or(0);
        let bundle = self
            .transport
            .verified_get(&self.session, key, since)
            .await?;
        if bundle.key != key {
            return Err(ClientError::EntryMismatch);
        }
        self.check_and_advance(&bundle, base)?;
        Ok(VerifiedEntry {
            key: bundle.key,
            value: bundle.value,
            tx_id: bundle.entry_tx_id,
            verified: true,
        })
    }

    /// Write `key`/`value` and verify the server committed exactly that
    /// entry before acknowledging it.
    pub async fn verified_write(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<VerifiedWrite, ClientError> {
        let base = self.current_anchor();
        let since = base.as_ref().map(|a| a.tree_size).unwrap_or(0);
        let bundle = self
            .transport
            .verified_set(&self.session, key, value, since)
            .await?;
        if bundle.key != key || bundle.value != value {
            return Err(ClientError::EntryMismatch);
        }
        let leaf = leaf_digest(&bundle.leaf_input());
        self.check_and_advance(&bundle, base)?;
        Ok(VerifiedWrite {
            tx_id: bundle.tx_id,
            leaf,
            verified: true,
        })
    }

    /// Verify `bundle` against the `base` snapshot and advance the anchor
    /// on success.
    ///
    /// Proof checking runs without holding the anchor lock; the advance
    /// re-checks under the lock and is the single atomic step, so a caller
    /// cancelled mid-verification can only lose the advance, never corrupt
    /// it.
    fn check_and_advance(
        &self,
        bundle: &ProofBundle,
        base: Option<TrustAnchor>,
    ) -> Result<(), ClientError> {
        if let Some(anchor) = &base {
            if bundle.tx_id < anchor.tx_id || bundle.tree_size < anchor.tree_size {
                warn!(
                    claimed = bundle.tx_id,
                    anchored = anchor.tx_id,
                    "rejecting stale transaction without verification"
                );
                return Err(ClientError::StaleTransaction {
                    claimed: bundle.tx_id,
                    claimed_size: bundle.tree_size,
                    anchored: anchor.tx_id,
                    anchored_size: anchor.tree_size,
                });
            }
        }

        verify_bundle(bundle, base.as_ref().map(|a| a.trusted_base()).as_ref()).map_err(
            |err| {
                if !matches!(err, VerifyError::Proof(_)) {
                    warn!(
                        tx_id = bundle.tx_id,
                        %err,
                        "proof verification failed, anchor left untouched"
                    );
                }
                map_verify_error(err)
            },
        )?;

        let advanced = TrustAnchor {
            database: self.session.database.clone(),
            tx_id: bundle.tx_id,
            tree_size: bundle.tree_size,
            root: bundle.root,
            public_key: base.as_ref().and_then(|a| a.public_key.clone()),
        };

        let mut guard = self.anchor.lock().expect("anchor lock poisoned");
        if *guard == base {
            info!(
                tx_id = advanced.tx_id,
                tree_size = advanced.tree_size,
                "trust anchor advanced"
            );
            *guard = Some(advanced);
        } else {
            // Another operation advanced the anchor while this proof was
            // being checked. The proof stands relative to its snapshot; the
            // newer anchor is kept.
            debug!(
                tx_id = advanced.tx_id,
                "anchor changed during verification, keeping the newer one"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::MemoryAnchorStore;
    use crate::transport::MockLedgerTransport;
    use sealkv_merkle::{Digest, LeafInput, MemoryTree};

    fn session() -> Session {
        Session::new("defaultdb", "token")
    }

    /// Transport backed by a real in-memory ledger.
    struct FakeLedger {
        state: Mutex<LedgerState>,
    }

    struct LedgerState {
        tree: MemoryTree,
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    }

    impl FakeLedger {
        fn new() -> Self {
            Self {
                state: Mutex::new(LedgerState {
                    tree: MemoryTree::new(),
                    entries: Vec::new(),
                }),
            }
        }
    }

    #[async_trait::async_trait]
    impl LedgerTransport for FakeLedger {
        async fn verified_get(
            &self,
            _session: &Session,
            key: &[u8],
            since_size: u64,
        ) -> Result<ProofBundle, TransportError> {
            let state = self.state.lock().unwrap();
            let index = state
                .entries
                .iter()
                .rposition(|(k, _)| k == key)
                .ok_or_else(|| TransportError::Rejected("key not found".to_string()))?;
            let (k, v) = &state.entries[index];
            let input = LeafInput {
                key: k,
                value: v,
                tx_id: index as u64 + 1,
                entry_count: index as u64 + 1,
            };
            ProofBundle::from_tree(&state.tree, &input, index as u64, state.tree.len(), since_size)
                .map_err(|err| TransportError::Rejected(err.to_string()))
        }

        async fn verified_set(
            &self,
            _session: &Session,
            key: &[u8],
            value: &[u8],
            since_size: u64,
        ) -> Result<ProofBundle, TransportError> {
            let mut state = self.state.lock().unwrap();
            let tx_id = state.tree.len() + 1;
            let input = LeafInput {
                key,
                value,
                tx_id,
                entry_count: tx_id,
            };
            state.tree.append(&input);
            state.entries.push((key.to_vec(), value.to_vec()));
            ProofBundle::from_tree(&state.tree, &input, tx_id - 1, state.tree.len(), since_size)
                .map_err(|err| TransportError::Rejected(err.to_string()))
        }
    }

    /// Reference ledger of `n` entries keyed `key-i`, one entry per tx.
    fn reference_ledger(n: u64, tag: &str) -> MemoryTree {
        let mut tree = MemoryTree::new();
        for i in 0..n {
            tree.append(&LeafInput {
                key: format!("{tag}-{i}").as_bytes(),
                value: format!("value-{i}").as_bytes(),
                tx_id: i + 1,
                entry_count: i + 1,
            });
        }
        tree
    }

    fn anchor_at(tree: &MemoryTree, size: u64) -> TrustAnchor {
        TrustAnchor {
            database: "defaultdb".to_string(),
            tx_id: size,
            tree_size: size,
            root: tree.root_at(size).unwrap(),
            public_key: None,
        }
    }

    fn bundle_for(tree: &MemoryTree, index: u64, size: u64, prior: u64, tag: &str) -> ProofBundle {
        let key = format!("{tag}-{index}");
        let value = format!("value-{index}");
        ProofBundle::from_tree(
            tree,
            &LeafInput {
                key: key.as_bytes(),
                value: value.as_bytes(),
                tx_id: index + 1,
                entry_count: index + 1,
            },
            index,
            size,
            prior,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_verified_operation_anchors_the_connection() {
        let coordinator = VerificationCoordinator::new(FakeLedger::new(), session());
        assert!(coordinator.current_anchor().is_none());

        let ack = coordinator.verified_write(b"key-0", b"value-0").await.unwrap();
        assert!(ack.verified);
        assert_eq!(ack.tx_id, 1);

        let anchor = coordinator.current_anchor().unwrap();
        assert_eq!(anchor.tx_id, 1);
        assert_eq!(anchor.tree_size, 1);
        assert_eq!(anchor.database, "defaultdb");
    }

    #[tokio::test]
    async fn anchor_advances_across_writes_and_reads() {
        let coordinator = VerificationCoordinator::new(FakeLedger::new(), session());
        coordinator.verified_write(b"alpha", b"one").await.unwrap();
        coordinator.verified_write(b"beta", b"two").await.unwrap();
        assert_eq!(coordinator.current_anchor().unwrap().tx_id, 2);

        // Reading the older entry still verifies: the proof is rooted in
        // the current state, only the leaf metadata is old.
        let entry = coordinator.verified_read(b"alpha").await.unwrap();
        assert!(entry.verified);
        assert_eq!(entry.tx_id, 1);
        assert_eq!(entry.value, b"one");
        assert_eq!(coordinator.current_anchor().unwrap().tx_id, 2);
    }

    #[tokio::test]
    async fn stale_state_is_rejected_before_any_crypto() {
        let tree = reference_ledger(5, "key");
        // Bundle rooted at size 2 with garbage proof material: if the
        // cryptographic verifiers ran, this would surface as tamper.
        let mut stale = bundle_for(&tree, 1, 2, 2, "key");
        stale.audit_path.clear();
        stale.root = Digest::new([0xee; 32]);

        let mut transport = MockLedgerTransport::new();
        transport
            .expect_verified_get()
            .returning(move |_, _, _| Ok(stale.clone()));

        let coordinator = VerificationCoordinator::new(transport, session());
        let store = MemoryAnchorStore::default();
        store.save(&anchor_at(&tree, 5)).unwrap();
        coordinator.load_anchor(&store).unwrap();

        let err = coordinator.verified_read(b"key-1").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::StaleTransaction {
                claimed: 2,
                anchored: 5,
                ..
            }
        ));
        assert_eq!(coordinator.current_anchor().unwrap().tx_id, 5);
    }

    #[tokio::test]
    async fn tampered_root_is_detected_and_anchor_untouched() {
        let tree = reference_ledger(5, "key");
        let mut forged = bundle_for(&tree, 4, 5, 4, "key");
        let mut bytes = *forged.root.as_bytes();
        bytes[0] ^= 0x01;
        forged.root = Digest::new(bytes);

        let mut transport = MockLedgerTransport::new();
        transport
            .expect_verified_get()
            .returning(move |_, _, _| Ok(forged.clone()));

        let coordinator = VerificationCoordinator::new(transport, session());
        let store = MemoryAnchorStore::default();
        store.save(&anchor_at(&tree, 4)).unwrap();
        coordinator.load_anchor(&store).unwrap();

        let err = coordinator.verified_read(b"key-4").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TamperDetected(VerifyError::Inclusion)
        ));
        assert_eq!(coordinator.current_anchor().unwrap(), anchor_at(&tree, 4));
    }

    #[tokio::test]
    async fn rewritten_history_fails_the_consistency_check() {
        // The server presents a perfectly self-consistent tree... built
        // from different history than the one the client trusts.
        let trusted = reference_ledger(4, "key");
        let rewritten = reference_ledger(5, "forged");
        let bundle = bundle_for(&rewritten, 4, 5, 4, "forged");
        let key = bundle.key.clone();

        let mut transport = MockLedgerTransport::new();
        transport
            .expect_verified_get()
            .returning(move |_, _, _| Ok(bundle.clone()));

        let coordinator = VerificationCoordinator::new(transport, session());
        let store = MemoryAnchorStore::default();
        store.save(&anchor_at(&trusted, 4)).unwrap();
        coordinator.load_anchor(&store).unwrap();

        let err = coordinator.verified_read(&key).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TamperDetected(VerifyError::Consistency)
        ));
        assert_eq!(coordinator.current_anchor().unwrap(), anchor_at(&trusted, 4));
    }

    #[tokio::test]
    async fn replaying_a_bundle_from_the_same_anchor_is_idempotent() {
        let tree = reference_ledger(5, "key");
        let bundle = bundle_for(&tree, 4, 5, 4, "key");
        let store = MemoryAnchorStore::default();
        store.save(&anchor_at(&tree, 4)).unwrap();

        let mut final_anchors = Vec::new();
        for _ in 0..2 {
            let replayed = bundle.clone();
            let mut transport = MockLedgerTransport::new();
            transport
                .expect_verified_get()
                .returning(move |_, _, _| Ok(replayed.clone()));
            let coordinator = VerificationCoordinator::new(transport, session());
            coordinator.load_anchor(&store).unwrap();
            coordinator.verified_read(b"key-4").await.unwrap();
            final_anchors.push(coordinator.current_anchor().unwrap());
        }
        assert_eq!(final_anchors[0], final_anchors[1]);
        assert_eq!(final_anchors[0].tx_id, 5);
    }

    #[tokio::test]
    async fn persisted_anchor_for_another_database_is_rejected() {
        let tree = reference_ledger(3, "key");
        let mut foreign = anchor_at(&tree, 3);
        foreign.database = "otherdb".to_string();
        let store = MemoryAnchorStore::default();
        store.save(&foreign).unwrap();

        let coordinator = VerificationCoordinator::new(FakeLedger::new(), session());
        let err = coordinator.load_anchor(&store).unwrap_err();
        assert!(matches!(err, ClientError::AnchorDatabaseMismatch { .. }));
        assert!(coordinator.current_anchor().is_none());
    }

    #[tokio::test]
    async fn load_anchor_never_regresses_a_live_anchor() {
        let coordinator = VerificationCoordinator::new(FakeLedger::new(), session());
        for i in 0..3u64 {
            coordinator
                .verified_write(format!("key-{i}").as_bytes(), b"value")
                .await
                .unwrap();
        }
        let live = coordinator.current_anchor().unwrap();

        let stale_tree = reference_ledger(1, "key");
        let store = MemoryAnchorStore::default();
        store.save(&anchor_at(&stale_tree, 1)).unwrap();
        let effective = coordinator.load_anchor(&store).unwrap().unwrap();
        assert_eq!(effective, live);
    }

    #[tokio::test]
    async fn save_anchor_round_trips_and_requires_an_anchor() {
        let coordinator = VerificationCoordinator::new(FakeLedger::new(), session());
        let store = MemoryAnchorStore::default();
        assert!(matches!(
            coordinator.save_anchor(&store).unwrap_err(),
            ClientError::Unanchored
        ));

        coordinator.verified_write(b"key-0", b"value-0").await.unwrap();
        let saved = coordinator.save_anchor(&store).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn transport_errors_pass_through_without_anchor_mutation() {
        let mut transport = MockLedgerTransport::new();
        transport.expect_verified_get().returning(|_, _, _| {
            Err(TransportError::Unavailable("connection refused".to_string()))
        });
        let coordinator = VerificationCoordinator::new(transport, session());
        let err = coordinator.verified_read(b"key-0").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(coordinator.current_anchor().is_none());
    }

    #[tokio::test]
    async fn mismatched_echo_is_a_protocol_error() {
        let tree = reference_ledger(3, "key");
        let bundle = bundle_for(&tree, 1, 3, 0, "key");
        let mut transport = MockLedgerTransport::new();
        transport
            .expect_verified_get()
            .returning(move |_, _, _| Ok(bundle.clone()));
        let coordinator = VerificationCoordinator::new(transport, session());
        // Asked for one key, server answered for another.
        let err = coordinator.verified_read(b"key-2").await.unwrap_err();
        assert!(matches!(err, ClientError::EntryMismatch));
        assert!(coordinator.current_anchor().is_none());
    }
}
