//! Port for coupon pool persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::coupon::{Coupon, CouponDraft};

/// Errors raised by coupon store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponStoreError {
    /// The draft's code collides with an existing coupon; callers retry
    /// with a regenerated code.
    #[error("coupon code already exists: {code}")]
    DuplicateCode { code: String },
    /// Store connection could not be established.
    #[error("coupon store connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("coupon store query failed: {message}")]
    Query { message: String },
}

impl CouponStoreError {
    pub fn duplicate_code(code: impl Into<String>) -> Self {
        Self::DuplicateCode { code: code.into() }
    }

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

/// Port owning coupon creation and eligibility lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Return one coupon satisfying `active && now < expires_at && under
    /// bound`, skipping `excluded` ids.
    ///
    /// Selection rotates the pool: least-redeemed first, oldest-created as
    /// the tie-break, so concurrent load does not pile onto one coupon.
    async fn find_eligible(
        &self,
        now: DateTime<Utc>,
        excluded: &[Uuid],
    ) -> Result<Option<Coupon>, CouponStoreError>;

    /// Persist a new coupon from a validated draft.
    async fn create(
        &self,
        draft: CouponDraft,
        now: DateTime<Utc>,
    ) -> Result<Coupon, CouponStoreError>;

    /// Read-only snapshot of every coupon, oldest first.
    async fn list_all(&self) -> Result<Vec<Coupon>, CouponStoreError>;
}
