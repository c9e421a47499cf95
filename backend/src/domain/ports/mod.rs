//! Domain ports and supporting types for the hexagonal boundary.

mod claim_committer;
mod claim_ledger;
mod claim_service;
mod coupon_store;
mod remote_minter;

#[cfg(test)]
pub use claim_committer::MockClaimCommitter;
pub use claim_committer::{ClaimCommitError, ClaimCommitter, CommittedClaim};
#[cfg(test)]
pub use claim_ledger::MockClaimLedger;
pub use claim_ledger::{ClaimLedger, ClaimLedgerError};
#[cfg(test)]
pub use claim_service::MockCouponClaims;
pub use claim_service::{CouponClaims, CouponStatus, GrantedCoupon, PoolStatus};
#[cfg(test)]
pub use coupon_store::MockCouponStore;
pub use coupon_store::{CouponStore, CouponStoreError};
#[cfg(test)]
pub use remote_minter::MockRemoteCouponMinter;
pub use remote_minter::{NoopRemoteMinter, RemoteCouponId, RemoteCouponMinter, RemoteMintError};
