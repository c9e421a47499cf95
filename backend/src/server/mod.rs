//! Server construction and middleware wiring.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use tracing::{info, warn};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use backend::doc::ApiDoc;
use backend::domain::allocation::{AllocationConfig, AllocationEngine};
use backend::domain::minting::MintPolicy;
use backend::domain::ports::{
    CouponClaims, CouponStore, CouponStoreError, NoopRemoteMinter, RemoteCouponMinter,
};
use backend::inbound::http::claims::{claim_coupon, pool_status};
use backend::inbound::http::health::{HealthState, liveness, readiness};
use backend::inbound::http::state::HttpState;
use backend::middleware::RequestTrace;
use backend::outbound::payments::{HttpRemoteMinter, PaymentApiConfig};
use backend::outbound::persistence::{
    DieselClaimCommitter, DieselClaimLedger, DieselCouponStore, InMemoryAllocationStore,
};

/// Coupons created on first start against an empty store.
const SEED_POOL_SIZE: usize = 3;

/// Populate an empty coupon pool so the very first claims do not all hit
/// the minting path.
async fn seed_pool_if_empty<S: CouponStore>(
    store: &S,
    mint: &MintPolicy,
    now: DateTime<Utc>,
) -> Result<(), CouponStoreError> {
    if !store.list_all().await?.is_empty() {
        return Ok(());
    }
    for _ in 0..SEED_POOL_SIZE {
        let draft = mint.draft(now);
        match store.create(draft, now).await {
            Ok(coupon) => info!(code = %coupon.code, "seeded coupon"),
            // A collision on startup is harmless; the pool just seeds smaller.
            Err(CouponStoreError::DuplicateCode { code }) => {
                warn!(%code, "seed code collision; skipping")
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

fn build_minter(payment: Option<PaymentApiConfig>) -> Arc<dyn RemoteCouponMinter> {
    match payment {
        Some(config) => match HttpRemoteMinter::new(config) {
            Ok(minter) => Arc::new(minter),
            Err(err) => {
                warn!(error = %err, "payment client construction failed; mirroring disabled");
                Arc::new(NoopRemoteMinter)
            }
        },
        None => Arc::new(NoopRemoteMinter),
    }
}

/// Build the claim service from configuration.
///
/// Uses the Diesel-backed adapters when a pool is available, otherwise the
/// in-memory store. Either way the pool is seeded when empty.
async fn build_claims(config: &ServerConfig) -> std::io::Result<Arc<dyn CouponClaims>> {
    let minter = build_minter(config.payment.clone());
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let now = clock.utc();
    let allocation = AllocationConfig {
        cooldown: config.cooldown,
        mint: MintPolicy::default(),
    };

    match &config.db_pool {
        Some(pool) => {
            let store = Arc::new(DieselCouponStore::new(pool.clone()));
            seed_pool_if_empty(store.as_ref(), &allocation.mint, now)
                .await
                .map_err(|err| std::io::Error::other(format!("coupon pool seeding: {err}")))?;
            Ok(Arc::new(AllocationEngine::new(
                store,
                Arc::new(DieselClaimLedger::new(pool.clone())),
                Arc::new(DieselClaimCommitter::new(pool.clone())),
                minter,
                clock,
                allocation,
            )))
        }
        None => {
            warn!("no database configured; claims are stored in memory");
            let store = Arc::new(InMemoryAllocationStore::new());
            seed_pool_if_empty(store.as_ref(), &allocation.mint, now)
                .await
                .map_err(|err| std::io::Error::other(format!("coupon pool seeding: {err}")))?;
            Ok(Arc::new(AllocationEngine::new(
                Arc::clone(&store),
                Arc::clone(&store),
                store,
                minter,
                clock,
                allocation,
            )))
        }
    }
}

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        key,
        cookie_secure,
        same_site,
    } = deps;

    let session = SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .session_lifecycle(
            PersistentSession::default().session_ttl(actix_web::cookie::time::Duration::hours(12)),
        )
        .build();

    // Probes and docs register before the catch-all session scope; the
    // scope would otherwise swallow their paths.
    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(RequestTrace)
        .service(readiness)
        .service(liveness);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app.service(
        web::scope("")
            .wrap(session)
            .service(claim_coupon)
            .service(pool_status),
    )
}

/// Construct an Actix HTTP server from the provided configuration.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when the claim service cannot be built or
/// the socket cannot be bound.
pub async fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let claims = build_claims(&config).await?;
    let http_state = web::Data::new(HttpState::new(claims));
    let server_health_state = health_state.clone();
    let ServerConfig {
        key,
        cookie_secure,
        same_site,
        bind_addr,
        ..
    } = config;

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
            key: key.clone(),
            cookie_secure,
            same_site,
        })
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
