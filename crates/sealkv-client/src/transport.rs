//! Transport seam between the verification engine and the ledger service.
//!
//! The engine never performs I/O itself: a transport implementation fetches
//! proof bundles over whatever channel it likes and hands them over fully
//! formed. Session state is owned by the transport's caller and passed
//! immutably with every call — the engine holds no ambient auth or database
//! state.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealkv_verify::ProofBundle;

/// Immutable session context attached to every transport call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Logical database the operation targets
    pub database: String,
    /// Bearer token obtained by the transport's authentication flow
    pub auth_token: String,
}

impl Session {
    pub fn new(database: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            auth_token: auth_token.into(),
        }
    }
}

/// Error types for transport operations.
///
/// Transport failures are recoverable by retry at the caller's discretion
/// and never cause anchor mutation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The service could not be reached
    #[error("ledger service unavailable: {0}")]
    Unavailable(String),
    /// The service answered with an error
    #[error("ledger service rejected the request: {0}")]
    Rejected(String),
    /// The session token was not accepted
    #[error("session is not authenticated for database {0}")]
    Unauthenticated(String),
}

/// Channel to the ledger service, supplying proof bundles for verified
/// operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Fetch the entry for `key` together with proof material, asking the
    /// service to prove consistency since the tree of `since_size` leaves.
    async fn verified_get(
        &self,
        session: &Session,
        key: &[u8],
        since_size: u64,
    ) -> Result<ProofBundle, TransportError>;

    /// Write `key`/`value` and fetch proof material for the resulting
    /// transaction, with consistency since `since_size`.
    async fn verified_set(
        &self,
        session: &Session,
        key: &[u8],
        value: &[u8],
        since_size: u64,
    ) -> Result<ProofBundle, TransportError>;
}
