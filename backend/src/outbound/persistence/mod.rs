//! Persistence adapters for the allocation ports.
//!
//! The Diesel adapters back production deployments; the in-memory store
//! backs development mode and end-to-end tests.

mod diesel_claim_committer;
mod diesel_claim_ledger;
mod diesel_coupon_store;
mod in_memory;
mod models;
mod pool;
mod schema;

pub use diesel_claim_committer::DieselClaimCommitter;
pub use diesel_claim_ledger::DieselClaimLedger;
pub use diesel_coupon_store::DieselCouponStore;
pub use in_memory::InMemoryAllocationStore;
pub use pool::{DbPool, PoolConfig, PoolError};
