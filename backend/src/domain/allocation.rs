//! Claim allocation engine.
//!
//! Coordinates the cooldown check, pool selection, on-demand minting, and
//! the atomic commit for one claim request. Correctness under concurrency is
//! delegated entirely to the store's atomic primitives: the engine holds no
//! in-process lock across await points, because multiple server instances
//! may run against the same database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::claim::ClaimIdentity;
use crate::domain::coupon::Coupon;
use crate::domain::minting::MintPolicy;
use crate::domain::ports::{
    ClaimCommitError, ClaimCommitter, ClaimLedger, ClaimLedgerError, CouponClaims, CouponStatus,
    CouponStore, CouponStoreError, GrantedCoupon, PoolStatus, RemoteCouponMinter, RemoteMintError,
};

/// Attempts to secure a coupon before giving up with `PoolExhausted`.
const MAX_COMMIT_ATTEMPTS: u8 = 3;

/// Attempts to generate a non-colliding code before failing the mint.
const MAX_CODE_ATTEMPTS: u8 = 3;

/// Tunables for the allocation engine.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// Window during which a matching identity may not claim again.
    pub cooldown: Duration,
    /// Policy applied when minting on pool exhaustion.
    pub mint: MintPolicy,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(60),
            mint: MintPolicy::default(),
        }
    }
}

fn map_ledger_error(error: ClaimLedgerError) -> Error {
    match error {
        ClaimLedgerError::Connection { message } => {
            Error::service_unavailable(format!("claim ledger unavailable: {message}"))
        }
        ClaimLedgerError::Query { message } => {
            Error::internal(format!("claim ledger error: {message}"))
        }
    }
}

fn map_store_error(error: CouponStoreError) -> Error {
    match error {
        CouponStoreError::Connection { message } => {
            Error::service_unavailable(format!("coupon store unavailable: {message}"))
        }
        CouponStoreError::DuplicateCode { code } => {
            // Recovered inside the mint loop; reaching here means retries ran out.
            Error::internal(format!("coupon code collision persisted: {code}"))
        }
        CouponStoreError::Query { message } => {
            Error::internal(format!("coupon store error: {message}"))
        }
    }
}

fn map_commit_error(error: ClaimCommitError) -> Error {
    match error {
        ClaimCommitError::Connection { message } => {
            Error::service_unavailable(format!("claim commit unavailable: {message}"))
        }
        ClaimCommitError::AlreadyExhausted { coupon_id } | ClaimCommitError::CouponMissing { coupon_id } => {
            // Recovered by the retry loop; reaching here means retries ran out.
            Error::internal(format!("claim commit lost coupon {coupon_id}"))
        }
        // The claim path maps this with the real horizon before it gets here.
        ClaimCommitError::CooldownHit { .. } => Error::cooldown_active(1),
        ClaimCommitError::Query { message } => {
            Error::internal(format!("claim commit error: {message}"))
        }
    }
}

/// Ceiling of the remaining wait, in whole minutes.
fn minutes_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds().max(0);
    (seconds + 59) / 60
}

/// Domain service implementing the [`CouponClaims`] driving port.
#[derive(Clone)]
pub struct AllocationEngine<S, L, C> {
    coupons: Arc<S>,
    ledger: Arc<L>,
    committer: Arc<C>,
    minter: Arc<dyn RemoteCouponMinter>,
    clock: Arc<dyn Clock>,
    config: AllocationConfig,
}

impl<S, L, C> AllocationEngine<S, L, C> {
    /// Create a new engine over the given ports.
    pub fn new(
        coupons: Arc<S>,
        ledger: Arc<L>,
        committer: Arc<C>,
        minter: Arc<dyn RemoteCouponMinter>,
        clock: Arc<dyn Clock>,
        config: AllocationConfig,
    ) -> Self {
        Self {
            coupons,
            ledger,
            committer,
            minter,
            clock,
            config,
        }
    }
}

impl<S, L, C> AllocationEngine<S, L, C>
where
    S: CouponStore,
    L: ClaimLedger,
    C: ClaimCommitter,
{
    /// Mint one coupon, regenerating the code on collision.
    ///
    /// Mirroring to the payment provider is best-effort: the local record is
    /// authoritative and any remote failure is logged and swallowed.
    async fn mint(&self, now: DateTime<Utc>) -> Result<Coupon, Error> {
        for attempt in 0..MAX_CODE_ATTEMPTS {
            let draft = self.config.mint.draft(now);
            match self.coupons.create(draft.clone(), now).await {
                Ok(coupon) => {
                    info!(code = %coupon.code, discount = coupon.discount_percent, "minted coupon");
                    match self.minter.create_remote(&draft).await {
                        Ok(remote) => {
                            debug!(code = %coupon.code, remote_id = %remote.0, "mirrored coupon")
                        }
                        Err(RemoteMintError::Disabled) => {
                            debug!(code = %coupon.code, "remote minting disabled; local record only")
                        }
                        Err(err) => {
                            warn!(code = %coupon.code, error = %err, "coupon mirror failed; local record is authoritative")
                        }
                    }
                    return Ok(coupon);
                }
                Err(CouponStoreError::DuplicateCode { code }) => {
                    debug!(%code, attempt, "coupon code collision; regenerating");
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }
        Err(Error::internal("could not generate a unique coupon code"))
    }
}

#[async_trait]
impl<S, L, C> CouponClaims for AllocationEngine<S, L, C>
where
    S: CouponStore,
    L: ClaimLedger,
    C: ClaimCommitter,
{
    async fn claim(&self, identity: ClaimIdentity) -> Result<GrantedCoupon, Error> {
        let now = self.clock.utc();
        let since = now - self.config.cooldown;

        if let Some(recent) = self
            .ledger
            .recent_claim(&identity, since)
            .await
            .map_err(map_ledger_error)?
        {
            let minutes = minutes_until(recent.claimed_at + self.config.cooldown, now);
            debug!(
                session = identity.session_token(),
                address = identity.network_address(),
                minutes,
                "claim rejected by cooldown"
            );
            return Err(Error::cooldown_active(minutes));
        }

        let mut excluded: Vec<Uuid> = Vec::new();
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let candidate = match self
                .coupons
                .find_eligible(now, &excluded)
                .await
                .map_err(map_store_error)?
            {
                Some(coupon) => coupon,
                None => self.mint(now).await?,
            };

            match self
                .committer
                .commit(candidate.id, &identity, now, since)
                .await
            {
                Ok(committed) => {
                    info!(
                        code = %committed.coupon.code,
                        session = identity.session_token(),
                        "coupon claimed"
                    );
                    return Ok(GrantedCoupon::from(committed.coupon));
                }
                Err(
                    ClaimCommitError::AlreadyExhausted { coupon_id }
                    | ClaimCommitError::CouponMissing { coupon_id },
                ) => {
                    debug!(%coupon_id, "commit lost the race; excluding coupon and retrying");
                    excluded.push(coupon_id);
                }
                Err(ClaimCommitError::CooldownHit { claimed_at }) => {
                    // A parallel request from the same identity committed
                    // between our ledger read and the write.
                    let minutes = minutes_until(claimed_at + self.config.cooldown, now);
                    debug!(
                        session = identity.session_token(),
                        minutes,
                        "claim rejected by commit-level cooldown check"
                    );
                    return Err(Error::cooldown_active(minutes));
                }
                Err(other) => return Err(map_commit_error(other)),
            }
        }

        warn!(
            attempts = MAX_COMMIT_ATTEMPTS,
            "pool contention exhausted the retry budget"
        );
        Err(Error::pool_exhausted())
    }

    async fn status(&self, identity: Option<ClaimIdentity>) -> Result<PoolStatus, Error> {
        let now = self.clock.utc();
        let coupons = self.coupons.list_all().await.map_err(map_store_error)?;

        let next_available = match identity {
            Some(identity) => self
                .ledger
                .recent_claim(&identity, now - self.config.cooldown)
                .await
                .map_err(map_ledger_error)?
                .map(|record| record.claimed_at + self.config.cooldown),
            None => None,
        };

        Ok(PoolStatus {
            coupons: coupons
                .iter()
                .map(|coupon| CouponStatus::derive(coupon, now, next_available))
                .collect(),
            next_available,
        })
    }
}

#[cfg(test)]
#[path = "allocation_tests.rs"]
mod tests;
