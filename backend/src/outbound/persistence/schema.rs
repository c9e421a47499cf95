//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations exactly; Diesel uses them for
//! compile-time query validation. Regenerate with `diesel print-schema` when
//! the migrations change.

diesel::table! {
    /// Coupon pool.
    ///
    /// `code` carries a unique index; exhausted coupons stay in the table
    /// with `active = false` so past claims keep a valid reference.
    coupons (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Globally unique redemption code.
        code -> Varchar,
        description -> Text,
        discount_percent -> Int2,
        expires_at -> Timestamptz,
        /// Redemption policy label: `once`, `repeating`, or `forever`.
        duration -> Varchar,
        /// Month count, only set for `repeating` coupons.
        duration_in_months -> Nullable<Int4>,
        /// Redemption bound; NULL means unbounded.
        max_redemptions -> Nullable<Int4>,
        times_redeemed -> Int4,
        active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Claim ledger: one row per granted coupon.
    ///
    /// Cooldown lookups filter on `session_token` OR `network_address`
    /// within a time window; both columns carry composite indexes with
    /// `claimed_at`.
    claims (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        session_token -> Varchar,
        network_address -> Varchar,
        coupon_id -> Uuid,
        claimed_at -> Timestamptz,
    }
}

diesel::joinable!(claims -> coupons (coupon_id));
diesel::allow_tables_to_appear_in_same_query!(claims, coupons);
