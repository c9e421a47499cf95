//! Shared application state for HTTP handlers.

use std::sync::Arc;

use crate::domain::ports::CouponClaims;

/// Handler state carrying the claim service behind its driving port.
#[derive(Clone)]
pub struct HttpState {
    pub claims: Arc<dyn CouponClaims>,
}

impl HttpState {
    pub fn new(claims: Arc<dyn CouponClaims>) -> Self {
        Self { claims }
    }
}
