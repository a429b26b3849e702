//! Governor middleware: one rate decision per request.
//!
//! Allowed requests continue down the chain; denied requests short-circuit
//! with a 429 envelope. Both carry `X-RateLimit-*` quota headers, and
//! denials add `Retry-After`.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use rategate_service::address::{self, ClientAddress};
use rategate_service::key::RequestContext;
use rategate_service::{RateGovernor, Verdict};

use crate::error::ApiError;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Authenticated requester, inserted as a request extension by an upstream
/// identity layer. Reported with violations when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterId(pub String);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolves the client address: trusted proxy headers first, then the
/// direct connection if the server was started with `ConnectInfo`.
pub fn client_address(req: &Request) -> ClientAddress {
    let headers = req.headers();
    let peer: Option<IpAddr> = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());

    address::resolve_with_peer(
        header_str(headers, address::FORWARDED_FOR),
        header_str(headers, address::REAL_IP),
        peer,
    )
}

/// Builds the governor's view of the request.
pub fn request_context(req: &Request) -> RequestContext {
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned);
    let user_id = req
        .extensions()
        .get::<RequesterId>()
        .map(|id| id.0.clone());

    RequestContext::new(client_address(req), req.uri().path())
        .with_user_agent(user_agent)
        .with_user_id(user_id)
}

/// Writes the quota headers for `verdict` onto `headers`.
pub fn apply_quota_headers(headers: &mut HeaderMap, verdict: &Verdict) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(verdict.limit));
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(verdict.remaining()),
    );
    headers.insert(
        X_RATELIMIT_RESET.clone(),
        HeaderValue::from(verdict.reset_epoch_secs()),
    );
    if let Some(retry_after) = verdict.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

/// Rate-limiting middleware. Returns 429 when the governor denies the attempt.
pub async fn rate_limit_middleware(
    State(governor): State<RateGovernor>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = request_context(&req);

    match governor.enforce(&ctx) {
        Ok(verdict) => {
            let mut response = next.run(req).await;
            apply_quota_headers(response.headers_mut(), &verdict);
            response
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
