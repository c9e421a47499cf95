//! PostgreSQL-backed `CouponStore` implementation using Diesel.
//!
//! All database operations are async via `diesel-async`. Eligibility
//! filtering happens in SQL so selection and commit agree on what
//! "available" means.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::coupon::{Coupon, CouponDraft};
use crate::domain::ports::{CouponStore, CouponStoreError};

use super::models::{CouponRow, NewCouponRow};
use super::pool::{DbPool, PoolError};
use super::schema::coupons;

/// Diesel-backed implementation of the `CouponStore` port.
#[derive(Clone)]
pub struct DieselCouponStore {
    pool: DbPool,
}

impl DieselCouponStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_pool_error(error: PoolError) -> CouponStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            CouponStoreError::connection(message)
        }
    }
}

pub(crate) fn map_diesel_error(error: diesel::result::Error) -> CouponStoreError {
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
            CouponStoreError::connection("database connection error")
        }
        _ => CouponStoreError::query("database error"),
    }
}

fn corrupted(message: String) -> CouponStoreError {
    CouponStoreError::query(format!("corrupted coupon row: {message}"))
}

#[async_trait]
impl CouponStore for DieselCouponStore {
    async fn find_eligible(
        &self,
        now: DateTime<Utc>,
        excluded: &[Uuid],
    ) -> Result<Option<Coupon>, CouponStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = coupons::table
            .filter(coupons::active.eq(true))
            .filter(coupons::expires_at.gt(now))
            .filter(
                coupons::max_redemptions
                    .is_null()
                    .or(coupons::times_redeemed
                        .nullable()
                        .lt(coupons::max_redemptions)),
            )
            .into_boxed();
        if !excluded.is_empty() {
            query = query.filter(coupons::id.ne_all(excluded.to_vec()));
        }

        let row: Option<CouponRow> = query
            // Rotate the pool: least-redeemed first, oldest as tie-break.
            .order((coupons::times_redeemed.asc(), coupons::created_at.asc()))
            .select(CouponRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(CouponRow::into_domain)
            .transpose()
            .map_err(corrupted)
    }

    async fn create(
        &self,
        draft: CouponDraft,
        now: DateTime<Utc>,
    ) -> Result<Coupon, CouponStoreError> {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        let coupon = Coupon::from_draft(draft, Uuid::new_v4(), now)
            .map_err(|err| CouponStoreError::query(format!("invalid coupon draft: {err}")))?;
        let months = coupon
            .redemption_policy
            .months()
            .map(i32::try_from)
            .transpose()
            .map_err(|_| CouponStoreError::query("month count out of range"))?;

        let new_row = NewCouponRow {
            id: coupon.id,
            code: &coupon.code,
            description: &coupon.description,
            discount_percent: i16::from(coupon.discount_percent),
            expires_at: coupon.expires_at,
            duration: coupon.redemption_policy.label(),
            duration_in_months: months,
            max_redemptions: coupon.max_redemptions,
            times_redeemed: coupon.times_redeemed,
            active: coupon.active,
            created_at: coupon.created_at,
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(coupons::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    CouponStoreError::duplicate_code(&coupon.code)
                }
                other => map_diesel_error(other),
            })?;

        Ok(coupon)
    }

    async fn list_all(&self) -> Result<Vec<Coupon>, CouponStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<CouponRow> = coupons::table
            .order(coupons::created_at.asc())
            .select(CouponRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|row| row.into_domain().map_err(corrupted))
            .collect()
    }
}
