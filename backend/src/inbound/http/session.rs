//! Session helpers to keep HTTP handlers free of framework-specific logic.
//!
//! Wraps the Actix cookie session so handlers only deal with the opaque
//! claim token. The token itself carries no meaning server-side; it exists
//! purely as a stable identity for cooldown matching.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::domain::Error;

pub(crate) const CLAIM_TOKEN_KEY: &str = "claim_token";

/// Newtype wrapper that exposes claim-token session operations.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Construct a new wrapper from the underlying Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Fetch the visitor's claim token from the session, if present.
    pub fn claim_token(&self) -> Result<Option<String>, Error> {
        let token = self
            .0
            .get::<String>(CLAIM_TOKEN_KEY)
            .map_err(|error| Error::internal(format!("failed to read session: {error}")))?;
        Ok(token.filter(|value| !value.trim().is_empty()))
    }

    /// Seed a fresh claim token into the session cookie.
    ///
    /// Called when no token accompanied the request; the claim itself is
    /// still rejected so the visitor retries with a stable identity.
    pub fn issue_claim_token(&self) -> Result<String, Error> {
        let token = Uuid::new_v4().to_string();
        self.0
            .insert(CLAIM_TOKEN_KEY, &token)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))?;
        Ok(token)
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
