//! Offline replay of captured proof bundles.
//!
//! `sealkv verify-bundle` re-runs the full verification pipeline against a
//! bundle previously captured from a ledger service, advancing the
//! persisted trust anchor exactly as a live session would.

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Args;
use tracing::info;

use sealkv_verify::ProofBundle;

use crate::anchor::FileAnchorStore;
use crate::coordinator::VerificationCoordinator;
use crate::transport::{LedgerTransport, Session, TransportError};

/// Transport serving one pre-fetched bundle instead of talking to a ledger
/// service.
pub struct ReplayTransport {
    bundle: ProofBundle,
}

impl ReplayTransport {
    pub fn new(bundle: ProofBundle) -> Self {
        Self { bundle }
    }
}

#[async_trait]
impl LedgerTransport for ReplayTransport {
    async fn verified_get(
        &self,
        _session: &Session,
        _key: &[u8],
        since_size: u64,
    ) -> Result<ProofBundle, TransportError> {
        if self.bundle.prior_size != since_size {
            return Err(TransportError::Rejected(format!(
                "bundle was captured since size {}, session trusts size {since_size}",
                self.bundle.prior_size
            )));
        }
        Ok(self.bundle.clone())
    }

    async fn verified_set(
        &self,
        _session: &Session,
        _key: &[u8],
        _value: &[u8],
        _since_size: u64,
    ) -> Result<ProofBundle, TransportError> {
        Err(TransportError::Rejected(
            "replay transport is read-only".to_string(),
        ))
    }
}

/// CLI arguments for the `verify-bundle` subcommand
#[derive(Clone, Debug, Args)]
pub struct VerifyBundleArgs {
    /// Path to the captured proof bundle (JSON)
    #[arg(long)]
    bundle_path: PathBuf,
    /// Path to the persisted trust anchor
    #[arg(long, env = "SEALKV_ANCHOR_PATH", default_value = "sealkv-anchor.json")]
    anchor_path: PathBuf,
    /// Logical database the bundle belongs to
    #[arg(long, env = "SEALKV_DATABASE", default_value = "defaultdb")]
    database: String,
}

/// Run the `verify-bundle` subcommand: load a bundle from disk, verify it
/// against the persisted anchor, and persist the advanced anchor.
pub async fn run(args: VerifyBundleArgs) -> Result<(), anyhow::Error> {
    let contents = std::fs::read_to_string(&args.bundle_path)?;
    let bundle: ProofBundle = serde_json::from_str(&contents)?;
    let key = bundle.key.clone();

    let store = FileAnchorStore::new(&args.anchor_path);
    let coordinator = VerificationCoordinator::new(
        ReplayTransport::new(bundle),
        Session::new(args.database.as_str(), ""),
    );
    coordinator.load_anchor(&store)?;

    let entry = coordinator.verified_read(&key).await?;
    info!(tx_id = entry.tx_id, "bundle verified");

    let anchor = coordinator.save_anchor(&store)?;
    info!(
        tx_id = anchor.tx_id,
        tree_size = anchor.tree_size,
        root = %anchor.root,
        "trust anchor advanced and persisted"
    );
    Ok(())
}
