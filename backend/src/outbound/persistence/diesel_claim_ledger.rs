//! PostgreSQL-backed `ClaimLedger` implementation using Diesel.
//!
//! Read-only by design: ledger rows are only ever written inside the claim
//! commit transaction so the ledger cannot drift from the redemption
//! counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::claim::{ClaimIdentity, ClaimRecord};
use crate::domain::ports::{ClaimLedger, ClaimLedgerError};

use super::models::ClaimRow;
use super::pool::{DbPool, PoolError};
use super::schema::claims;

/// Diesel-backed implementation of the `ClaimLedger` port.
#[derive(Clone)]
pub struct DieselClaimLedger {
    pool: DbPool,
}

impl DieselClaimLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_pool_error(error: PoolError) -> ClaimLedgerError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ClaimLedgerError::connection(message)
        }
    }
}

pub(crate) fn map_diesel_error(error: diesel::result::Error) -> ClaimLedgerError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            ClaimLedgerError::connection("database connection error")
        }
        _ => ClaimLedgerError::query("database error"),
    }
}

#[async_trait]
impl ClaimLedger for DieselClaimLedger {
    async fn recent_claim(
        &self,
        identity: &ClaimIdentity,
        since: DateTime<Utc>,
    ) -> Result<Option<ClaimRecord>, ClaimLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // OR-match: a returning visitor is caught whether they cleared
        // cookies (same address) or changed networks (same token).
        let row: Option<ClaimRow> = claims::table
            .filter(claims::claimed_at.gt(since))
            .filter(
                claims::session_token
                    .eq(identity.session_token())
                    .or(claims::network_address.eq(identity.network_address())),
            )
            .order(claims::claimed_at.desc())
            .select(ClaimRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(ClaimRow::into_domain)
            .transpose()
            .map_err(|message| ClaimLedgerError::query(format!("corrupted claim row: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("pool exhausted"));
        assert!(matches!(err, ClaimLedgerError::Connection { .. }));
    }

    #[rstest]
    fn query_failures_map_to_query_error() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, ClaimLedgerError::Query { .. }));
    }
}
