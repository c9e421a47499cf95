//! Claim identity and ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors raised when constructing a [`ClaimIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimIdentityValidationError {
    #[error("session token must not be empty")]
    EmptySessionToken,
    #[error("network address must not be empty")]
    EmptyNetworkAddress,
}

/// The identity a claim is rate-limited against.
///
/// Derived from request metadata, never persisted as its own entity. A
/// browser session maps to one `session_token`, but `network_address` may be
/// shared across sessions (NAT), which is exactly why cooldown matching
/// considers either field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimIdentity {
    session_token: String,
    network_address: String,
}

impl ClaimIdentity {
    /// Validate and build an identity from its two components.
    pub fn try_new(
        session_token: impl Into<String>,
        network_address: impl Into<String>,
    ) -> Result<Self, ClaimIdentityValidationError> {
        let session_token = session_token.into();
        let network_address = network_address.into();
        if session_token.trim().is_empty() {
            return Err(ClaimIdentityValidationError::EmptySessionToken);
        }
        if network_address.trim().is_empty() {
            return Err(ClaimIdentityValidationError::EmptyNetworkAddress);
        }
        Ok(Self {
            session_token,
            network_address,
        })
    }

    /// Opaque client-persisted session token.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Transport-level (or proxy-forwarded) peer address.
    pub fn network_address(&self) -> &str {
        &self.network_address
    }

    /// Cooldown matching rule: same session token OR same network address.
    ///
    /// OR-matching is intentional: it blocks a second session sharing an IP
    /// as well as a returning session from a new address.
    pub fn overlaps(&self, other: &ClaimIdentity) -> bool {
        self.session_token == other.session_token
            || self.network_address == other.network_address
    }
}

/// Append-only record of one successful claim.
///
/// Created exactly once per grant, atomically with the coupon's
/// `times_redeemed` increment; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: Uuid,
    pub identity: ClaimIdentity,
    pub coupon_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}
