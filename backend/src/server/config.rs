//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use actix_web::cookie::{Key, SameSite};
use backend::outbound::payments::PaymentApiConfig;
use backend::outbound::persistence::DbPool;
use chrono::Duration;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) cooldown: Duration,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) payment: Option<PaymentApiConfig>,
}

impl ServerConfig {
    /// Construct a server configuration using application preferences.
    ///
    /// The claim cooldown defaults to 60 minutes.
    #[must_use]
    pub fn new(key: Key, cookie_secure: bool, same_site: SameSite, bind_addr: SocketAddr) -> Self {
        Self {
            key,
            cookie_secure,
            same_site,
            bind_addr,
            cooldown: Duration::minutes(60),
            db_pool: None,
            payment: None,
        }
    }

    /// Override the per-identity claim cooldown window.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Attach a database connection pool for the persistence adapters.
    ///
    /// Without a pool, the server falls back to the in-memory store, which
    /// is only suitable for development.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Attach payment-provider settings enabling coupon mirroring.
    #[must_use]
    pub fn with_payment(mut self, payment: PaymentApiConfig) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Return the socket address the server will bind to.
    #[cfg_attr(
        not(any(test, doctest)),
        expect(
            dead_code,
            reason = "Exercised by integration tests; retained for fixture access"
        )
    )]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
