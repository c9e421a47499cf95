//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into consistent JSON responses, status
//! codes, and `Retry-After` hints.

use actix_web::http::StatusCode;
use actix_web::http::header;
use actix_web::{HttpResponse, ResponseError};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::MissingIdentity => StatusCode::BAD_REQUEST,
        ErrorCode::CooldownActive | ErrorCode::PoolExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code(), ErrorCode::InternalError) {
        Error::internal("Internal server error")
    } else {
        error.clone()
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self.code(), ErrorCode::InternalError) {
            error!(message = self.message(), "internal error surfaced to client");
        }
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(seconds) = self.retry_after_seconds() {
            builder.insert_header((header::RETRY_AFTER, seconds.to_string()));
        }
        builder.json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Error::missing_identity(), StatusCode::BAD_REQUEST)]
    #[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(Error::cooldown_active(10), StatusCode::TOO_MANY_REQUESTS)]
    #[case(Error::pool_exhausted(), StatusCode::TOO_MANY_REQUESTS)]
    #[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_codes_to_statuses(#[case] error: Error, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[rstest]
    fn cooldown_response_carries_retry_after_header() {
        let response = Error::cooldown_active(5).error_response();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .expect("Retry-After header present");
        assert_eq!(retry_after, "300");
    }

    #[rstest]
    fn internal_detail_is_redacted() {
        let redacted = redact_if_internal(&Error::internal("connection string leaked"));
        assert_eq!(redacted.message(), "Internal server error");
    }

    #[rstest]
    fn non_internal_detail_is_preserved() {
        let original = Error::service_unavailable("store down");
        assert_eq!(redact_if_internal(&original), original);
    }
}
