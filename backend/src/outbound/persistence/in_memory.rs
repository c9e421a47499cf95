//! In-memory allocation store.
//!
//! Backs development mode (no `DATABASE_URL`) and the end-to-end claim
//! tests. All three persistence ports share one mutex-guarded state, which
//! gives the same atomicity the Diesel adapters get from a transaction:
//! the cooldown re-check, the redemption increment, and the ledger append
//! happen under a single lock acquisition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::claim::{ClaimIdentity, ClaimRecord};
use crate::domain::coupon::{Coupon, CouponDraft};
use crate::domain::ports::{
    ClaimCommitError, ClaimCommitter, ClaimLedger, ClaimLedgerError, CommittedClaim, CouponStore,
    CouponStoreError,
};

#[derive(Debug, Default)]
struct InMemoryState {
    coupons: Vec<Coupon>,
    claims: Vec<ClaimRecord>,
}

/// Single-process implementation of the coupon store, claim ledger, and
/// claim committer.
#[derive(Clone, Default)]
pub struct InMemoryAllocationStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger size, exposed for diagnostics and tests.
    pub async fn claim_count(&self) -> usize {
        self.state.lock().await.claims.len()
    }
}

#[async_trait]
impl CouponStore for InMemoryAllocationStore {
    async fn find_eligible(
        &self,
        now: DateTime<Utc>,
        excluded: &[Uuid],
    ) -> Result<Option<Coupon>, CouponStoreError> {
        let state = self.state.lock().await;
        Ok(state
            .coupons
            .iter()
            .filter(|coupon| coupon.is_eligible(now) && !excluded.contains(&coupon.id))
            .min_by_key(|coupon| (coupon.times_redeemed, coupon.created_at))
            .cloned())
    }

    async fn create(
        &self,
        draft: CouponDraft,
        now: DateTime<Utc>,
    ) -> Result<Coupon, CouponStoreError> {
        let mut state = self.state.lock().await;
        if state.coupons.iter().any(|coupon| coupon.code == draft.code) {
            return Err(CouponStoreError::duplicate_code(draft.code));
        }
        let coupon = Coupon::from_draft(draft, Uuid::new_v4(), now)
            .map_err(|err| CouponStoreError::query(format!("invalid coupon draft: {err}")))?;
        state.coupons.push(coupon.clone());
        Ok(coupon)
    }

    async fn list_all(&self) -> Result<Vec<Coupon>, CouponStoreError> {
        let state = self.state.lock().await;
        let mut coupons = state.coupons.clone();
        coupons.sort_by_key(|coupon| coupon.created_at);
        Ok(coupons)
    }
}

#[async_trait]
impl ClaimLedger for InMemoryAllocationStore {
    async fn recent_claim(
        &self,
        identity: &ClaimIdentity,
        since: DateTime<Utc>,
    ) -> Result<Option<ClaimRecord>, ClaimLedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .claims
            .iter()
            .filter(|record| record.claimed_at > since && record.identity.overlaps(identity))
            .max_by_key(|record| record.claimed_at)
            .cloned())
    }
}

#[async_trait]
impl ClaimCommitter for InMemoryAllocationStore {
    async fn commit(
        &self,
        coupon_id: Uuid,
        identity: &ClaimIdentity,
        claimed_at: DateTime<Utc>,
        cooldown_since: DateTime<Utc>,
    ) -> Result<CommittedClaim, ClaimCommitError> {
        let mut state = self.state.lock().await;
        if let Some(held) = state
            .claims
            .iter()
            .filter(|record| {
                record.claimed_at > cooldown_since && record.identity.overlaps(identity)
            })
            .max_by_key(|record| record.claimed_at)
        {
            return Err(ClaimCommitError::CooldownHit {
                claimed_at: held.claimed_at,
            });
        }
        let coupon = state
            .coupons
            .iter_mut()
            .find(|coupon| coupon.id == coupon_id)
            .ok_or(ClaimCommitError::CouponMissing { coupon_id })?;

        if !coupon.apply_redemption(claimed_at) {
            return Err(ClaimCommitError::AlreadyExhausted { coupon_id });
        }
        let coupon = coupon.clone();

        let record = ClaimRecord {
            id: Uuid::new_v4(),
            identity: identity.clone(),
            coupon_id,
            claimed_at,
        };
        state.claims.push(record.clone());

        Ok(CommittedClaim { coupon, record })
    }
}
