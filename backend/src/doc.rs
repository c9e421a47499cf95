//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for
//! the claim endpoints. The generated document is served by Swagger UI in
//! debug builds only.

use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::claims::{ClaimedCouponBody, CouponStatusBody, PoolStatusBody};

/// OpenAPI document for the coupon claim API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coupon claim API",
        description = "Anonymous coupon distribution with per-visitor cooldown."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::claims::claim_coupon,
        crate::inbound::http::claims::pool_status,
    ),
    components(schemas(
        ClaimedCouponBody,
        CouponStatusBody,
        PoolStatusBody,
        Error,
        ErrorCode
    )),
    tags(
        (name = "claims", description = "Coupon claiming and pool status")
    )
)]
pub struct ApiDoc;
