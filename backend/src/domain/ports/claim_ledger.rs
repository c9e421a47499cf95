//! Port for cooldown lookups against the claim ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::claim::{ClaimIdentity, ClaimRecord};

/// Errors raised by claim ledger adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimLedgerError {
    /// Ledger connection could not be established.
    #[error("claim ledger connection failed: {message}")]
    Connection { message: String },
    /// Query failed during execution.
    #[error("claim ledger query failed: {message}")]
    Query { message: String },
}

impl ClaimLedgerError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Port reading the append-only claim history.
///
/// Writes do not go through this port: ledger rows are inserted only inside
/// the [`ClaimCommitter`](super::ClaimCommitter) transaction so the ledger
/// and the redemption counters never diverge.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Most recent record claimed after `since` whose identity matches on
    /// session token OR network address.
    async fn recent_claim(
        &self,
        identity: &ClaimIdentity,
        since: DateTime<Utc>,
    ) -> Result<Option<ClaimRecord>, ClaimLedgerError>;
}
