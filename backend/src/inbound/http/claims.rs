//! Claim and status HTTP handlers.
//!
//! ```text
//! POST /claim
//! GET  /status
//! ```

use actix_web::{HttpRequest, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::{CouponStatus, GrantedCoupon, PoolStatus};
use crate::inbound::http::ApiResult;
use crate::inbound::http::identity::resolve_identity;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Response payload for a granted coupon.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedCouponBody {
    #[schema(example = "SAVE15-7KQ2XM")]
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    #[schema(format = "date-time")]
    pub expires_at: DateTime<Utc>,
    /// Duration semantics: `once`, `repeating`, or `forever`.
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_months: Option<u32>,
}

impl From<GrantedCoupon> for ClaimedCouponBody {
    fn from(granted: GrantedCoupon) -> Self {
        Self {
            code: granted.code,
            description: granted.description,
            discount_percent: granted.discount_percent,
            expires_at: granted.expires_at,
            duration: granted.redemption_policy.label().to_owned(),
            duration_in_months: granted.redemption_policy.months(),
        }
    }
}

/// Per-coupon entry in the status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponStatusBody {
    pub code: String,
    pub description: String,
    pub discount_percent: u8,
    #[schema(format = "date-time")]
    pub expires_at: DateTime<Utc>,
    pub claimed: i32,
    pub available: bool,
    /// When the requesting visitor may claim this coupon next, if in
    /// cooldown.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(format = "date-time")]
    pub next_available: Option<DateTime<Utc>>,
}

impl From<CouponStatus> for CouponStatusBody {
    fn from(status: CouponStatus) -> Self {
        Self {
            code: status.code,
            description: status.description,
            discount_percent: status.discount_percent,
            expires_at: status.expires_at,
            claimed: status.claimed,
            available: status.available,
            next_available: status.next_available,
        }
    }
}

/// Response payload for the pool snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatusBody {
    pub coupons: Vec<CouponStatusBody>,
    /// When the requesting visitor may claim next, if in cooldown.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(format = "date-time")]
    pub next_available: Option<DateTime<Utc>>,
}

impl From<PoolStatus> for PoolStatusBody {
    fn from(status: PoolStatus) -> Self {
        Self {
            coupons: status.coupons.into_iter().map(Into::into).collect(),
            next_available: status.next_available,
        }
    }
}

/// Allocate a coupon to the requesting visitor.
///
/// A request without a claim token is seeded with a fresh one and rejected:
/// a claim with no stable identity cannot be rate-limited correctly, so the
/// visitor retries with the cookie now set.
#[utoipa::path(
    post,
    path = "/claim",
    responses(
        (status = 200, description = "Coupon granted", body = ClaimedCouponBody),
        (status = 400, description = "Missing or invalid identity", body = Error),
        (status = 429, description = "Cooldown active or pool contended", body = Error),
        (status = 503, description = "Storage unavailable", body = Error),
    )
)]
#[post("/claim")]
pub async fn claim_coupon(
    req: HttpRequest,
    session: SessionContext,
    state: web::Data<HttpState>,
) -> ApiResult<web::Json<ClaimedCouponBody>> {
    let token = match session.claim_token()? {
        Some(token) => token,
        None => {
            session.issue_claim_token()?;
            return Err(Error::missing_identity());
        }
    };
    let identity = resolve_identity(&req, token)?;
    let granted = state.claims.claim(identity).await?;
    Ok(web::Json(ClaimedCouponBody::from(granted)))
}

/// Read-only snapshot of the coupon pool.
///
/// Never issues a session token; anonymous callers simply get no cooldown
/// horizon.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Pool snapshot", body = PoolStatusBody),
        (status = 503, description = "Storage unavailable", body = Error),
    )
)]
#[get("/status")]
pub async fn pool_status(
    req: HttpRequest,
    session: SessionContext,
    state: web::Data<HttpState>,
) -> ApiResult<web::Json<PoolStatusBody>> {
    let identity = session
        .claim_token()?
        .and_then(|token| resolve_identity(&req, token).ok());
    let status = state.claims.status(identity).await?;
    Ok(web::Json(PoolStatusBody::from(status)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::coupon::RedemptionPolicy;
    use crate::domain::ports::MockCouponClaims;
    use crate::inbound::http::test_utils::test_session_middleware;

    fn granted() -> GrantedCoupon {
        GrantedCoupon {
            code: "SAVE15-7KQ2XM".to_owned(),
            description: "15% off your order".to_owned(),
            discount_percent: 15,
            expires_at: Utc::now() + Duration::days(90),
            redemption_policy: RedemptionPolicy::Once,
        }
    }

    fn test_app(
        claims: MockCouponClaims,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(HttpState::new(Arc::new(claims))))
            .wrap(test_session_middleware())
            .service(claim_coupon)
            .service(pool_status)
            .route(
                "/seed-session",
                web::get().to(|session: SessionContext| async move {
                    session.issue_claim_token()?;
                    Ok::<_, Error>(HttpResponse::Ok())
                }),
            )
    }

    async fn session_cookie(
        app: &impl actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
    ) -> actix_web::cookie::Cookie<'static> {
        let res = test::call_service(
            app,
            test::TestRequest::get().uri("/seed-session").to_request(),
        )
        .await;
        res.response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned()
    }

    #[actix_web::test]
    async fn claim_without_token_is_rejected_and_seeds_cookie() {
        let mut claims = MockCouponClaims::new();
        claims.expect_claim().times(0);
        let app = test::init_service(test_app(claims)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/claim")
                .insert_header(("X-Forwarded-For", "203.0.113.7"))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(
            res.response()
                .cookies()
                .any(|cookie| cookie.name() == "session"),
            "rejection must still seed the identity cookie"
        );
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "missing_identity");
    }

    #[actix_web::test]
    async fn claim_with_token_returns_coupon_fields() {
        let mut claims = MockCouponClaims::new();
        claims
            .expect_claim()
            .withf(|identity| identity.network_address() == "203.0.113.7")
            .times(1)
            .returning(|_| Ok(granted()));
        let app = test::init_service(test_app(claims)).await;
        let cookie = session_cookie(&app).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/claim")
                .insert_header(("X-Forwarded-For", "203.0.113.7"))
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["code"], "SAVE15-7KQ2XM");
        assert_eq!(body["discountPercent"], 15);
        assert_eq!(body["duration"], "once");
        assert!(body.get("durationInMonths").is_none());
    }

    #[actix_web::test]
    async fn cooldown_maps_to_429_with_retry_hint() {
        let mut claims = MockCouponClaims::new();
        claims
            .expect_claim()
            .times(1)
            .returning(|_| Err(Error::cooldown_active(30)));
        let app = test::init_service(test_app(claims)).await;
        let cookie = session_cookie(&app).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/claim")
                .insert_header(("X-Forwarded-For", "203.0.113.7"))
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.response()
                .headers()
                .get(actix_web::http::header::RETRY_AFTER)
                .expect("Retry-After present"),
            "1800"
        );
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "cooldown_active");
        assert_eq!(body["retryAfterSeconds"], 1800);
    }

    #[actix_web::test]
    async fn status_without_cookie_passes_no_identity() {
        let mut claims = MockCouponClaims::new();
        claims
            .expect_status()
            .withf(|identity| identity.is_none())
            .times(1)
            .returning(|_| {
                Ok(PoolStatus {
                    coupons: Vec::new(),
                    next_available: None,
                })
            });
        let app = test::init_service(test_app(claims)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(
            !res.response()
                .cookies()
                .any(|cookie| cookie.name() == "session"),
            "status must not issue identity cookies"
        );
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["coupons"], serde_json::json!([]));
        assert!(body.get("nextAvailable").is_none());
    }

    #[actix_web::test]
    async fn status_with_cookie_reports_cooldown_horizon() {
        let next = Utc::now() + Duration::minutes(42);
        let mut claims = MockCouponClaims::new();
        claims
            .expect_status()
            .withf(|identity| identity.is_some())
            .times(1)
            .returning(move |_| {
                Ok(PoolStatus {
                    coupons: vec![CouponStatus {
                        code: "SAVE15-7KQ2XM".to_owned(),
                        description: "15% off your order".to_owned(),
                        discount_percent: 15,
                        expires_at: next + Duration::days(90),
                        claimed: 1,
                        available: true,
                        next_available: Some(next),
                    }],
                    next_available: Some(next),
                })
            });
        let app = test::init_service(test_app(claims)).await;
        let cookie = session_cookie(&app).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/status")
                .insert_header(("X-Forwarded-For", "203.0.113.7"))
                .cookie(cookie)
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert!(body.get("nextAvailable").is_some());
        assert!(body["coupons"][0].get("nextAvailable").is_some());
    }
}
