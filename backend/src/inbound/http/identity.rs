//! Identity resolution from request metadata.
//!
//! Pure derivation with no side effects: the claim token comes from the
//! session layer, the network address from the transport peer or the
//! reverse-proxy `X-Forwarded-For` header. Trusting a client-suppliable
//! header is a known spoofing risk; it is accepted here because the service
//! sits behind a proxy that overwrites the header, and the session-token
//! half of the identity still applies when the address is forged.

use actix_web::HttpRequest;

use crate::domain::Error;
use crate::domain::claim::ClaimIdentity;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Derive the claim identity from the request and a session claim token.
pub fn resolve_identity(req: &HttpRequest, claim_token: String) -> Result<ClaimIdentity, Error> {
    let address = network_address(req)
        .ok_or_else(|| Error::internal("client network address unavailable"))?;
    ClaimIdentity::try_new(claim_token, address)
        .map_err(|err| Error::invalid_request(format!("invalid claim identity: {err}")))
}

/// Proxy-forwarded address when present, transport peer address otherwise.
///
/// `X-Forwarded-For` lists hops client-first; only the first entry names
/// the original client.
fn network_address(req: &HttpRequest) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(forwarded.to_owned());
    }
    req.peer_addr().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;
    use rstest::rstest;

    use super::*;

    fn peer() -> std::net::SocketAddr {
        "10.0.0.9:44321".parse().expect("valid socket address")
    }

    #[rstest]
    fn prefers_first_forwarded_hop() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .peer_addr(peer())
            .to_http_request();

        let identity = resolve_identity(&req, "tok".to_owned()).expect("identity resolves");
        assert_eq!(identity.network_address(), "203.0.113.7");
        assert_eq!(identity.session_token(), "tok");
    }

    #[rstest]
    fn falls_back_to_peer_address() {
        let req = TestRequest::default().peer_addr(peer()).to_http_request();

        let identity = resolve_identity(&req, "tok".to_owned()).expect("identity resolves");
        assert_eq!(identity.network_address(), "10.0.0.9");
    }

    #[rstest]
    fn blank_forwarded_header_falls_back_to_peer() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "  "))
            .peer_addr(peer())
            .to_http_request();

        let identity = resolve_identity(&req, "tok".to_owned()).expect("identity resolves");
        assert_eq!(identity.network_address(), "10.0.0.9");
    }

    #[rstest]
    fn missing_address_is_an_internal_error() {
        let req = TestRequest::default().to_http_request();
        let error = resolve_identity(&req, "tok".to_owned()).expect_err("no address source");
        assert_eq!(error.code(), crate::domain::ErrorCode::InternalError);
    }

    #[rstest]
    fn empty_token_is_invalid() {
        let req = TestRequest::default().peer_addr(peer()).to_http_request();
        let error = resolve_identity(&req, "  ".to_owned()).expect_err("blank token");
        assert_eq!(error.code(), crate::domain::ErrorCode::InvalidRequest);
    }
}
