//! Port for best-effort coupon mirroring to the payment provider.

use async_trait::async_trait;

use crate::domain::coupon::CouponDraft;

/// Errors raised by remote minting adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteMintError {
    /// No provider is configured; mirroring is skipped entirely.
    #[error("remote minting disabled")]
    Disabled,
    /// The provider could not be reached.
    #[error("remote mint transport failed: {message}")]
    Transport { message: String },
    /// The provider rejected the request.
    #[error("remote mint rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteMintError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Identifier of the mirrored coupon object on the provider side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCouponId(pub String);

/// Port creating a matching coupon object in the external payment system.
///
/// Strictly best-effort: the local record is authoritative, failures are
/// logged and swallowed by the engine, and no allocation decision ever
/// depends on the remote outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCouponMinter: Send + Sync {
    async fn create_remote(&self, draft: &CouponDraft) -> Result<RemoteCouponId, RemoteMintError>;
}

/// Fixture used when no payment provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRemoteMinter;

#[async_trait]
impl RemoteCouponMinter for NoopRemoteMinter {
    async fn create_remote(
        &self,
        _draft: &CouponDraft,
    ) -> Result<RemoteCouponId, RemoteMintError> {
        Err(RemoteMintError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::minting::MintPolicy;

    #[rstest]
    #[tokio::test]
    async fn noop_minter_reports_disabled() {
        let draft = MintPolicy::default().draft(Utc::now());
        let err = NoopRemoteMinter
            .create_remote(&draft)
            .await
            .expect_err("noop minter never mirrors");
        assert_eq!(err, RemoteMintError::Disabled);
    }
}
