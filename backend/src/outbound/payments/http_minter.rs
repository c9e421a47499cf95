//! Reqwest-backed payment-provider minting adapter.
//!
//! Owns transport details only: request serialisation, bearer auth, timeout
//! and HTTP error mapping. The engine treats every failure here as
//! non-fatal, so this adapter never retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::domain::coupon::CouponDraft;
use crate::domain::ports::{RemoteCouponId, RemoteCouponMinter, RemoteMintError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 256;

/// Connection settings for the payment provider's coupon API.
#[derive(Debug, Clone)]
pub struct PaymentApiConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub timeout: Duration,
}

impl PaymentApiConfig {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Remote minting adapter performing one HTTP POST per coupon.
pub struct HttpRemoteMinter {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpRemoteMinter {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: PaymentApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

/// Provider-side coupon creation payload.
#[derive(Debug, Serialize, PartialEq)]
struct RemoteCouponRequest<'a> {
    code: &'a str,
    percent_off: u8,
    duration: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_in_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_redemptions: Option<i32>,
    redeem_by: i64,
}

#[derive(Debug, Deserialize)]
struct RemoteCouponDto {
    id: String,
}

fn build_payload(draft: &CouponDraft) -> RemoteCouponRequest<'_> {
    RemoteCouponRequest {
        code: &draft.code,
        percent_off: draft.discount_percent,
        duration: draft.redemption_policy.label(),
        duration_in_months: draft.redemption_policy.months(),
        max_redemptions: draft.max_redemptions,
        redeem_by: draft.expires_at.timestamp(),
    }
}

fn map_transport_error(error: reqwest::Error) -> RemoteMintError {
    RemoteMintError::transport(error.to_string())
}

fn truncate_body(body: &str) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_owned()
    }
}

#[async_trait]
impl RemoteCouponMinter for HttpRemoteMinter {
    async fn create_remote(&self, draft: &CouponDraft) -> Result<RemoteCouponId, RemoteMintError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&build_payload(draft))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteMintError::rejected(
                status.as_u16(),
                truncate_body(&body),
            ));
        }

        let dto: RemoteCouponDto = response.json().await.map_err(map_transport_error)?;
        Ok(RemoteCouponId(dto.id))
    }
}
