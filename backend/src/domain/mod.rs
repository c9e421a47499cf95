//! Domain layer: coupon allocation logic and the ports it depends on.

pub mod allocation;
pub mod claim;
pub mod coupon;
mod error;
pub mod minting;
pub mod ports;

pub use allocation::{AllocationConfig, AllocationEngine};
pub use claim::{ClaimIdentity, ClaimRecord};
pub use coupon::{Coupon, CouponDraft, RedemptionPolicy};
pub use error::{Error, ErrorCode};
