//! Service entry-point: logging, configuration, and server bootstrap.

mod server;

use std::env;

use actix_web::cookie::{Key, SameSite};
use actix_web::web;
use chrono::Duration;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use backend::inbound::http::health::HealthState;
use backend::outbound::payments::PaymentApiConfig;
use backend::outbound::persistence::{DbPool, PoolConfig};
use server::ServerConfig;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let key = load_session_key()?;
    let cookie_secure = env::var("SESSION_COOKIE_SECURE")
        .map(|v| v != "0")
        .unwrap_or(true);
    let bind_addr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()
        .map_err(|e| std::io::Error::other(format!("invalid BIND_ADDR: {e}")))?;

    let mut config = ServerConfig::new(key, cookie_secure, SameSite::Lax, bind_addr)
        .with_cooldown(claim_cooldown()?);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        let pool = DbPool::new(PoolConfig::new(database_url))
            .await
            .map_err(|e| std::io::Error::other(format!("database pool: {e}")))?;
        config = config.with_db_pool(pool);
    }
    if let Some(payment) = payment_config()? {
        config = config.with_payment(payment);
    }

    let health_state = web::Data::new(HealthState::new());
    let srv = server::create_server(health_state, config).await?;
    srv.await
}

/// Load the cookie signing key, falling back to an ephemeral key in debug
/// builds (or when explicitly allowed) so local runs need no secret file.
fn load_session_key() -> std::io::Result<Key> {
    let key_path =
        env::var("SESSION_KEY_FILE").unwrap_or_else(|_| "/var/run/secrets/session_key".into());
    match std::fs::read(&key_path) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(e) => {
            let allow_dev = env::var("SESSION_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(path = %key_path, error = %e, "using temporary session key (dev only)");
                Ok(Key::generate())
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read session key at {key_path}: {e}"
                )))
            }
        }
    }
}

/// Cooldown window from `CLAIM_COOLDOWN_MINUTES`, defaulting to 60.
fn claim_cooldown() -> std::io::Result<Duration> {
    match env::var("CLAIM_COOLDOWN_MINUTES") {
        Ok(raw) => {
            let minutes: i64 = raw
                .parse()
                .map_err(|e| std::io::Error::other(format!("invalid CLAIM_COOLDOWN_MINUTES: {e}")))?;
            if minutes < 1 {
                return Err(std::io::Error::other(
                    "CLAIM_COOLDOWN_MINUTES must be at least 1",
                ));
            }
            Ok(Duration::minutes(minutes))
        }
        Err(_) => Ok(Duration::minutes(60)),
    }
}

/// Payment-provider settings from `PAYMENT_API_URL` and `PAYMENT_API_KEY`.
///
/// Both must be present to enable mirroring; a URL without a key is a
/// configuration error rather than a silent no-op.
fn payment_config() -> std::io::Result<Option<PaymentApiConfig>> {
    let Ok(raw_url) = env::var("PAYMENT_API_URL") else {
        return Ok(None);
    };
    let endpoint: Url = raw_url
        .parse()
        .map_err(|e| std::io::Error::other(format!("invalid PAYMENT_API_URL: {e}")))?;
    let api_key = env::var("PAYMENT_API_KEY")
        .map_err(|_| std::io::Error::other("PAYMENT_API_URL set without PAYMENT_API_KEY"))?;
    Ok(Some(PaymentApiConfig::new(endpoint, api_key)))
}
