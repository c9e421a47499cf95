//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses or any other protocol-specific envelope; see
//! `inbound::http::error` for the status-code mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// No stable visitor identity accompanied the request.
    MissingIdentity,
    /// The identity claimed recently and must wait out the cooldown.
    CooldownActive,
    /// No coupon could be secured after bounded retries.
    PoolExhausted,
    /// Storage is down or slow; the caller should retry shortly.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload returned to adapters.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use backend::domain::{Error, ErrorCode};
///
/// let err = Error::pool_exhausted();
/// assert_eq!(err.code(), ErrorCode::PoolExhausted);
/// assert!(err.retry_after_seconds().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(rename = "error")]
    #[schema(example = "cooldown_active")]
    code: ErrorCode,
    #[schema(example = "Coupon already claimed; try again in 30 minutes")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Validation errors emitted by the fallible constructor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    #[error("error message must not be empty")]
    EmptyMessage,
}

impl Error {
    /// Create a new error, panicking if validation fails.
    ///
    /// All messages passed by this crate are static or formatted non-empty
    /// strings, so the panic path is unreachable in practice.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            retry_after_seconds: None,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Retry hint in seconds, when the failure is retryable-later.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after_seconds
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach a numeric retry hint to the error.
    pub fn with_retry_after_seconds(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::MissingIdentity`].
    ///
    /// The surrounding HTTP layer issues a fresh session token alongside this
    /// rejection, so a reload is expected to succeed.
    pub fn missing_identity() -> Self {
        Self::new(
            ErrorCode::MissingIdentity,
            "No visitor identity present; enable cookies and reload",
        )
    }

    /// Convenience constructor for [`ErrorCode::CooldownActive`].
    ///
    /// `minutes_remaining` is the ceiling of the remaining wait; it doubles
    /// as the retry hint.
    pub fn cooldown_active(minutes_remaining: i64) -> Self {
        let minutes = minutes_remaining.max(1);
        Self::new(
            ErrorCode::CooldownActive,
            format!("Coupon already claimed; try again in {minutes} minutes"),
        )
        .with_retry_after_seconds(minutes as u64 * 60)
    }

    /// Convenience constructor for [`ErrorCode::PoolExhausted`].
    pub fn pool_exhausted() -> Self {
        Self::new(
            ErrorCode::PoolExhausted,
            "No coupons are available right now; try again shortly",
        )
        .with_retry_after_seconds(30)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message).with_retry_after_seconds(10)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn rejects_empty_message() {
        let err = Error::try_new(ErrorCode::InternalError, "   ");
        assert_eq!(err, Err(ErrorValidationError::EmptyMessage));
    }

    #[rstest]
    fn cooldown_carries_minutes_and_hint() {
        let err = Error::cooldown_active(30);
        assert_eq!(err.code(), ErrorCode::CooldownActive);
        assert!(err.message().contains("30 minutes"));
        assert_eq!(err.retry_after_seconds(), Some(1800));
    }

    #[rstest]
    fn cooldown_floors_at_one_minute() {
        let err = Error::cooldown_active(0);
        assert!(err.message().contains("1 minutes"));
        assert_eq!(err.retry_after_seconds(), Some(60));
    }

    #[rstest]
    fn serialises_code_under_error_key() {
        let err = Error::pool_exhausted();
        let value = serde_json::to_value(&err).expect("serialise error");
        assert_eq!(value["error"], "pool_exhausted");
        assert_eq!(value["retryAfterSeconds"], 30);
    }

    #[rstest]
    fn omits_absent_hint_and_details() {
        let err = Error::internal("boom");
        let value = serde_json::to_value(&err).expect("serialise error");
        assert!(value.get("retryAfterSeconds").is_none());
        assert!(value.get("details").is_none());
    }
}
