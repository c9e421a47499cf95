//! Driving port consumed by the HTTP adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::Error;
use crate::domain::claim::ClaimIdentity;
use crate::domain::coupon::{Coupon, RedemptionPolicy};

/// Public fields of a granted coupon, as returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedCoupon {
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    pub expires_at: DateTime<Utc>,
    pub redemption_policy: RedemptionPolicy,
}

impl From<Coupon> for GrantedCoupon {
    fn from(coupon: Coupon) -> Self {
        Self {
            code: coupon.code,
            description: coupon.description,
            discount_percent: coupon.discount_percent,
            expires_at: coupon.expires_at,
            redemption_policy: coupon.redemption_policy,
        }
    }
}

/// Per-coupon view in the status snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponStatus {
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    pub expires_at: DateTime<Utc>,
    /// Committed redemption count.
    pub claimed: i32,
    /// Whether the coupon could be handed out right now.
    pub available: bool,
    /// When the requesting identity may claim this coupon next; `None`
    /// when it is not in cooldown (or the request was anonymous).
    pub next_available: Option<DateTime<Utc>>,
}

impl CouponStatus {
    /// Derive the status view of one coupon at `now`.
    pub fn derive(coupon: &Coupon, now: DateTime<Utc>, next_available: Option<DateTime<Utc>>) -> Self {
        Self {
            code: coupon.code.clone(),
            description: coupon.description.clone(),
            discount_percent: coupon.discount_percent,
            expires_at: coupon.expires_at,
            claimed: coupon.times_redeemed,
            available: coupon.is_eligible(now),
            next_available,
        }
    }
}

/// Snapshot of the pool plus the caller's own cooldown horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatus {
    pub coupons: Vec<CouponStatus>,
    /// When the requesting identity may claim next; `None` when it is not
    /// in cooldown (or no identity accompanied the request).
    pub next_available: Option<DateTime<Utc>>,
}

/// Driving port for claim allocation and pool inspection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponClaims: Send + Sync {
    /// Allocate a coupon to `identity`, enforcing the cooldown.
    async fn claim(&self, identity: ClaimIdentity) -> Result<GrantedCoupon, Error>;

    /// Read-only pool snapshot; `identity` scopes the cooldown horizon.
    async fn status(&self, identity: Option<ClaimIdentity>) -> Result<PoolStatus, Error>;
}
