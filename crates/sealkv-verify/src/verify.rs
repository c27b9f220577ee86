//! End-to-end verification of a proof bundle against optional trusted state.

use thiserror::Error;
use tracing::debug;

use sealkv_merkle::leaf_digest;

use crate::bundle::{ProofBundle, TrustedBase};
use crate::consistency::verify_consistency;
use crate::inclusion::verify_inclusion;
use crate::ProofError;

/// Why a proof bundle failed to verify.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Malformed proof material — a protocol mismatch, not a tamper signal
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// The recomputed leaf digest is not anchored under the claimed root
    #[error("inclusion check failed: entry is not anchored under the claimed root")]
    Inclusion,
    /// The claimed root does not extend the trusted history
    #[error("consistency check failed: claimed tree does not extend the trusted tree")]
    Consistency,
}

/// Verify a proof bundle.
///
/// Recomputes the leaf digest from the bundle's raw entry, checks its
/// inclusion under the claimed root, and, when `base` is present, checks
/// that the claimed root is an append-only extension of the trusted state.
/// With no `base` the consistency check is skipped — the trust-on-first-use
/// point of a fresh connection.
///
/// Pure computation: retrying with the same bundle can never change the
/// outcome.
pub fn verify_bundle(bundle: &ProofBundle, base: Option<&TrustedBase>) -> Result<(), VerifyError> {
    debug!(
        tx_id = bundle.tx_id,
        tree_size = bundle.tree_size,
        leaf_index = bundle.leaf_index,
        "verifying proof bundle"
    );
    let leaf = leaf_digest(&bundle.leaf_input());
    if !verify_inclusion(
        &leaf,
        &bundle.audit_path,
        &bundle.root,
        bundle.leaf_index,
        bundle.tree_size,
    )? {
        return Err(VerifyError::Inclusion);
    }

    if let Some(base) = base {
        if bundle.prior_size != base.tree_size {
            return Err(ProofError::BaseMismatch {
                bundle: bundle.prior_size,
                trusted: base.tree_size,
            }
            .into());
        }
        if !verify_consistency(
            base.tree_size,
            &base.root,
            bundle.tree_size,
            &bundle.root,
            &bundle.consistency_proof,
        )? {
            return Err(VerifyError::Consistency);
        }
    }
    Ok(())
}
