//! Coupon aggregate and its validation rules.
//!
//! A coupon is created once (pool seeding or on-demand minting), redeemed
//! many times up to an optional bound, and deactivated rather than deleted
//! when exhausted. All mutation of `times_redeemed` goes through the atomic
//! commit in the allocation store; the aggregate only exposes the invariant
//! checks and the redemption transition used by adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Duration semantics attached to a coupon for downstream use.
///
/// The allocation engine does not interpret these beyond surfacing them in
/// responses; expiry and redemption bounds are enforced separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionPolicy {
    /// Redeemable against a single order.
    Once,
    /// Recurring discount for the given number of months.
    Repeating { months: u32 },
    /// Recurring discount with no end.
    Forever,
}

impl RedemptionPolicy {
    /// Stable label used on the wire and in storage.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Repeating { .. } => "repeating",
            Self::Forever => "forever",
        }
    }

    /// Month count for repeating policies.
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Repeating { months } => Some(*months),
            _ => None,
        }
    }

    /// Reconstruct a policy from its stored label and month count.
    pub fn from_parts(label: &str, months: Option<u32>) -> Result<Self, CouponValidationError> {
        match (label, months) {
            ("once", _) => Ok(Self::Once),
            ("forever", _) => Ok(Self::Forever),
            ("repeating", Some(months)) if months > 0 => Ok(Self::Repeating { months }),
            _ => Err(CouponValidationError::UnknownPolicy {
                label: label.to_owned(),
            }),
        }
    }
}

/// Validation errors raised when constructing a [`Coupon`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponValidationError {
    #[error("coupon code must not be empty")]
    EmptyCode,
    #[error("coupon description must not be empty")]
    EmptyDescription,
    #[error("discount must be between 0 and 100 percent, got {value}")]
    DiscountOutOfRange { value: u16 },
    #[error("max redemptions must be at least 1, got {value}")]
    NonPositiveBound { value: i32 },
    #[error("unknown redemption policy label: {label}")]
    UnknownPolicy { label: String },
}

/// Attributes of a coupon prior to persistence.
///
/// Drafts carry everything the caller decides; identifiers and timestamps
/// are stamped by the store at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponDraft {
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    pub expires_at: DateTime<Utc>,
    pub redemption_policy: RedemptionPolicy,
    pub max_redemptions: Option<i32>,
}

/// A persisted coupon.
///
/// ## Invariants
/// - `code` is globally unique (enforced by the store).
/// - `times_redeemed` never decreases.
/// - `active` is false whenever `max_redemptions` is set and
///   `times_redeemed >= max_redemptions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    pub expires_at: DateTime<Utc>,
    pub redemption_policy: RedemptionPolicy,
    pub max_redemptions: Option<i32>,
    pub times_redeemed: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Validate a draft and materialise it as a fresh coupon.
    pub fn from_draft(
        draft: CouponDraft,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CouponValidationError> {
        if draft.code.trim().is_empty() {
            return Err(CouponValidationError::EmptyCode);
        }
        if draft.description.trim().is_empty() {
            return Err(CouponValidationError::EmptyDescription);
        }
        if draft.discount_percent > 100 {
            return Err(CouponValidationError::DiscountOutOfRange {
                value: u16::from(draft.discount_percent),
            });
        }
        if let Some(bound) = draft.max_redemptions {
            if bound < 1 {
                return Err(CouponValidationError::NonPositiveBound { value: bound });
            }
        }

        Ok(Self {
            id,
            code: draft.code,
            description: draft.description,
            discount_percent: draft.discount_percent,
            expires_at: draft.expires_at,
            redemption_policy: draft.redemption_policy,
            max_redemptions: draft.max_redemptions,
            times_redeemed: 0,
            active: true,
            created_at,
        })
    }

    /// True when the redemption bound is set and used up.
    pub fn exhausted(&self) -> bool {
        self.max_redemptions
            .is_some_and(|bound| self.times_redeemed >= bound)
    }

    /// True when the coupon may be handed out at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at && !self.exhausted()
    }

    /// Apply one redemption, deactivating when the bound is reached.
    ///
    /// This is the in-process equivalent of the store's compare-and-swap:
    /// callers must hold whatever exclusivity their store provides. Returns
    /// false (and leaves the coupon untouched) when it is not eligible.
    pub fn apply_redemption(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_eligible(now) {
            return false;
        }
        self.times_redeemed += 1;
        if self.exhausted() {
            self.active = false;
        }
        true
    }
}
