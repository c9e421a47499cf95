//! Port for the atomic claim commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::claim::{ClaimIdentity, ClaimRecord};
use crate::domain::coupon::Coupon;

/// Errors raised by claim commit adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimCommitError {
    /// A concurrent redeemer consumed the last slot first; callers retry
    /// against a different coupon.
    #[error("coupon {coupon_id} exhausted by a concurrent claim")]
    AlreadyExhausted { coupon_id: Uuid },
    /// The coupon disappeared between selection and commit.
    #[error("coupon {coupon_id} no longer exists")]
    CouponMissing { coupon_id: Uuid },
    /// A claim from a matching identity landed inside the cooldown window
    /// after the engine's ledger read; the increment is rolled back.
    #[error("identity already claimed at {claimed_at}")]
    CooldownHit { claimed_at: DateTime<Utc> },
    /// Store connection could not be established.
    #[error("claim commit connection failed: {message}")]
    Connection { message: String },
    /// The transaction failed during execution.
    #[error("claim commit failed: {message}")]
    Query { message: String },
}

impl ClaimCommitError {
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

/// Outcome of a successful commit: the coupon after its increment and the
/// ledger row written alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedClaim {
    pub coupon: Coupon,
    pub record: ClaimRecord,
}

/// Port performing the redemption increment and ledger insert as one unit.
///
/// The increment is a compare-and-swap guarded by `active` and the
/// redemption bound, not a blind add: under concurrency the losing writer
/// observes [`ClaimCommitError::AlreadyExhausted`] instead of pushing the
/// counter past the bound. The identity cooldown is re-checked against
/// `cooldown_since` inside the same atomic unit, so two simultaneous
/// requests from one identity admit at most one claim even though the
/// engine's own ledger read raced. Partial effects never commit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimCommitter: Send + Sync {
    async fn commit(
        &self,
        coupon_id: Uuid,
        identity: &ClaimIdentity,
        claimed_at: DateTime<Utc>,
        cooldown_since: DateTime<Utc>,
    ) -> Result<CommittedClaim, ClaimCommitError>;
}
