//! Internal Diesel row structs and their domain conversions.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::claim::{ClaimIdentity, ClaimRecord};
use crate::domain::coupon::{Coupon, RedemptionPolicy};

use super::schema::{claims, coupons};

/// Row struct for reading from the coupons table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CouponRow {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub discount_percent: i16,
    pub expires_at: DateTime<Utc>,
    pub duration: String,
    pub duration_in_months: Option<i32>,
    pub max_redemptions: Option<i32>,
    pub times_redeemed: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl CouponRow {
    /// Rebuild the domain aggregate, rejecting rows that violate its
    /// invariants (range errors only happen on hand-edited data).
    pub(crate) fn into_domain(self) -> Result<Coupon, String> {
        let discount_percent = u8::try_from(self.discount_percent)
            .map_err(|_| format!("discount out of range: {}", self.discount_percent))?;
        let months = self
            .duration_in_months
            .map(u32::try_from)
            .transpose()
            .map_err(|_| format!("month count out of range: {:?}", self.duration_in_months))?;
        let redemption_policy = RedemptionPolicy::from_parts(&self.duration, months)
            .map_err(|err| err.to_string())?;

        Ok(Coupon {
            id: self.id,
            code: self.code,
            description: self.description,
            discount_percent,
            expires_at: self.expires_at,
            redemption_policy,
            max_redemptions: self.max_redemptions,
            times_redeemed: self.times_redeemed,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for creating coupon records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = coupons)]
pub(crate) struct NewCouponRow<'a> {
    pub id: Uuid,
    pub code: &'a str,
    pub description: &'a str,
    pub discount_percent: i16,
    pub expires_at: DateTime<Utc>,
    pub duration: &'a str,
    pub duration_in_months: Option<i32>,
    pub max_redemptions: Option<i32>,
    pub times_redeemed: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading from the claims table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = claims)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ClaimRow {
    pub id: Uuid,
    pub session_token: String,
    pub network_address: String,
    pub coupon_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimRow {
    pub(crate) fn into_domain(self) -> Result<ClaimRecord, String> {
        let identity = ClaimIdentity::try_new(self.session_token, self.network_address)
            .map_err(|err| err.to_string())?;
        Ok(ClaimRecord {
            id: self.id,
            identity,
            coupon_id: self.coupon_id,
            claimed_at: self.claimed_at,
        })
    }
}

/// Insertable struct for appending ledger records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = claims)]
pub(crate) struct NewClaimRow<'a> {
    pub id: Uuid,
    pub session_token: &'a str,
    pub network_address: &'a str,
    pub coupon_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}
