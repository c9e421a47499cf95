//! PostgreSQL-backed `ClaimCommitter` implementation using Diesel.
//!
//! The redemption increment and the ledger insert run inside one database
//! transaction. The increment itself is a guarded `UPDATE .. RETURNING`:
//! the row must still be active, unexpired, and under its redemption bound
//! for the write to match, so two concurrent claimers can never both take
//! the last slot. The identity cooldown is re-checked inside the same
//! transaction; when a matching claim already landed, the increment rolls
//! back with `CooldownHit`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::claim::{ClaimIdentity, ClaimRecord};
use crate::domain::ports::{ClaimCommitError, ClaimCommitter, CommittedClaim};

use super::models::{CouponRow, NewClaimRow};
use super::pool::{DbPool, PoolError};
use super::schema::{claims, coupons};

/// Diesel-backed implementation of the `ClaimCommitter` port.
#[derive(Clone)]
pub struct DieselClaimCommitter {
    pool: DbPool,
}

impl DieselClaimCommitter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Transaction-internal error: either a domain outcome to surface verbatim
/// or a Diesel failure still to be mapped. Diesel's transaction wrapper
/// requires `From<diesel::result::Error>`.
#[derive(Debug)]
enum TxError {
    Domain(ClaimCommitError),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

fn map_pool_error(error: PoolError) -> ClaimCommitError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ClaimCommitError::connection(message)
        }
    }
}

fn map_tx_error(error: TxError) -> ClaimCommitError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        TxError::Domain(err) => err,
        TxError::Diesel(err) => {
            match &err {
                DieselError::DatabaseError(kind, info) => {
                    debug!(?kind, message = info.message(), "claim transaction failed");
                }
                _ => debug!(
                    error_type = %std::any::type_name_of_val(&err),
                    "claim transaction failed"
                ),
            }
            match err {
                DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
                    ClaimCommitError::connection("database connection error")
                }
                _ => ClaimCommitError::query("database error"),
            }
        }
    }
}

#[async_trait]
impl ClaimCommitter for DieselClaimCommitter {
    async fn commit(
        &self,
        coupon_id: Uuid,
        identity: &ClaimIdentity,
        claimed_at: DateTime<Utc>,
        cooldown_since: DateTime<Utc>,
    ) -> Result<CommittedClaim, ClaimCommitError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let record_id = Uuid::new_v4();

        let row = conn
            .transaction::<CouponRow, TxError, _>(|conn| {
                async move {
                    let updated: Option<CouponRow> = diesel::update(
                        coupons::table.filter(
                            coupons::id
                                .eq(coupon_id)
                                .and(coupons::active.eq(true))
                                .and(coupons::expires_at.gt(claimed_at))
                                .and(coupons::max_redemptions.is_null().or(
                                    coupons::times_redeemed
                                        .nullable()
                                        .lt(coupons::max_redemptions),
                                )),
                        ),
                    )
                    .set(coupons::times_redeemed.eq(coupons::times_redeemed + 1))
                    .returning(CouponRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;

                    let row = match updated {
                        Some(row) => row,
                        None => {
                            // Zero rows matched: tell the caller whether the
                            // coupon lost a race or vanished entirely.
                            let exists: bool = diesel::select(diesel::dsl::exists(
                                coupons::table.filter(coupons::id.eq(coupon_id)),
                            ))
                            .get_result(conn)
                            .await?;
                            let outcome = if exists {
                                ClaimCommitError::AlreadyExhausted { coupon_id }
                            } else {
                                ClaimCommitError::CouponMissing { coupon_id }
                            };
                            return Err(TxError::Domain(outcome));
                        }
                    };

                    // The guarded update above holds the coupon row lock, so
                    // a same-identity commit racing on this coupon is either
                    // already visible here or queued behind us.
                    let conflict: Option<DateTime<Utc>> = claims::table
                        .filter(claims::claimed_at.gt(cooldown_since).and(
                            claims::session_token
                                .eq(identity.session_token())
                                .or(claims::network_address.eq(identity.network_address())),
                        ))
                        .select(claims::claimed_at)
                        .order(claims::claimed_at.desc())
                        .first(conn)
                        .await
                        .optional()?;
                    if let Some(held_at) = conflict {
                        return Err(TxError::Domain(ClaimCommitError::CooldownHit {
                            claimed_at: held_at,
                        }));
                    }

                    // Retire the coupon once its bound is used up so later
                    // selections skip it.
                    if row
                        .max_redemptions
                        .is_some_and(|bound| row.times_redeemed >= bound)
                    {
                        diesel::update(coupons::table.filter(coupons::id.eq(coupon_id)))
                            .set(coupons::active.eq(false))
                            .execute(conn)
                            .await?;
                    }

                    let new_claim = NewClaimRow {
                        id: record_id,
                        session_token: identity.session_token(),
                        network_address: identity.network_address(),
                        coupon_id,
                        claimed_at,
                    };
                    diesel::insert_into(claims::table)
                        .values(&new_claim)
                        .execute(conn)
                        .await?;

                    Ok(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_tx_error)?;

        let mut coupon = row
            .into_domain()
            .map_err(|message| ClaimCommitError::query(format!("corrupted coupon row: {message}")))?;
        // The RETURNING row predates the deactivation write.
        if coupon.exhausted() {
            coupon.active = false;
        }

        Ok(CommittedClaim {
            coupon,
            record: ClaimRecord {
                id: record_id,
                identity: identity.clone(),
                coupon_id,
                claimed_at,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn domain_outcomes_pass_through() {
        let coupon_id = Uuid::new_v4();
        let err = map_tx_error(TxError::Domain(ClaimCommitError::AlreadyExhausted {
            coupon_id,
        }));
        assert_eq!(err, ClaimCommitError::AlreadyExhausted { coupon_id });
    }

    #[rstest]
    fn cooldown_conflicts_pass_through() {
        let held_at = Utc::now();
        let err = map_tx_error(TxError::Domain(ClaimCommitError::CooldownHit {
            claimed_at: held_at,
        }));
        assert_eq!(err, ClaimCommitError::CooldownHit { claimed_at: held_at });
    }

    #[rstest]
    fn diesel_failures_map_to_query_error() {
        let err = map_tx_error(TxError::Diesel(diesel::result::Error::RollbackTransaction));
        assert!(matches!(err, ClaimCommitError::Query { .. }));
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        let err = map_tx_error(TxError::Diesel(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("gone".to_string()),
        )));
        assert!(matches!(err, ClaimCommitError::Connection { .. }));
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(err, ClaimCommitError::Connection { .. }));
    }
}
