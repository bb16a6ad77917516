//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login and registration (~10/min per IP)
//! - `api_rate_limiter`: the rest of `/api` (~100/min per IP)
//!
//! Rejections are rendered through [`AppError`] so clients always get the
//! JSON error envelope.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::StorefrontConfig;
use crate::error::AppError;

/// Proxy headers consulted for the client address, most specific first.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Keys requests by client IP.
///
/// Uses the TCP peer address (requires `into_make_service_with_connect_info`).
/// Addresses reported in proxy headers are used only when
/// `trust_proxy_headers` is set; otherwise any client could pick its own key.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        self.trust_proxy_headers
            .then(|| forwarded_ip(req.headers()))
            .flatten()
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| header(*name))
        .chain(header("x-forwarded-for").and_then(|chain| chain.split(',').next()))
        .find_map(|value| value.trim().parse().ok())
}

/// Render a limiter rejection as an [`AppError`].
fn rejection_response(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => {
            let mut response = AppError::RateLimited.into_response();
            if let Ok(value) = HeaderValue::from_str(&wait_time.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("rate limiter could not determine client address".to_string())
                .into_response()
        }
        GovernorError::Other { code, msg, .. } => {
            let msg = msg.unwrap_or_else(|| code.to_string());
            if code.is_server_error() {
                AppError::Internal(msg).into_response()
            } else {
                AppError::BadRequest(msg).into_response()
            }
        }
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(
    keys: ClientIpKeyExtractor,
    replenish_every_secs: u64,
    burst: u32,
) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(keys)
        .per_second(replenish_every_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)).error_handler(rejection_response))
}

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// One token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Never in practice: both parameters are non-zero constants.
#[must_use]
#[allow(clippy::expect_used)]
pub fn auth_rate_limiter(config: &StorefrontConfig) -> RateLimiterLayer {
    limiter(ClientIpKeyExtractor::new(config.trust_proxy_headers), 6, 5)
        .expect("non-zero rate limiter parameters")
}

/// Create rate limiter for general API: ~100 requests per minute per IP.
///
/// One token per second, burst of 50.
///
/// # Panics
///
/// Never in practice: both parameters are non-zero constants.
#[must_use]
#[allow(clippy::expect_used)]
pub fn api_rate_limiter(config: &StorefrontConfig) -> RateLimiterLayer {
    limiter(ClientIpKeyExtractor::new(config.trust_proxy_headers), 1, 50)
        .expect("non-zero rate limiter parameters")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const TRUSTED: ClientIpKeyExtractor = ClientIpKeyExtractor::new(true);
    const UNTRUSTED: ClientIpKeyExtractor = ClientIpKeyExtractor::new(false);

    fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(addr.parse().unwrap())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .header("cf-connecting-ip", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let ip = TRUSTED.extract(&req).unwrap();
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_first_forwarded_for_entry() {
        let req = Request::builder()
            .header("x-forwarded-for", "198.51.100.4 , 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        let ip = TRUSTED.extract(&req).unwrap();
        assert_eq!(ip, "198.51.100.4".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_untrusted_headers_are_ignored() {
        let req = Request::builder()
            .header("x-real-ip", "203.0.113.99")
            .header("x-forwarded-for", "198.51.100.4")
            .extension(peer("192.0.2.9:5123"))
            .body(Body::empty())
            .unwrap();
        let ip = UNTRUSTED.extract(&req).unwrap();
        assert_eq!(ip, "192.0.2.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let req = Request::builder()
            .extension(peer("192.0.2.9:5123"))
            .body(Body::empty())
            .unwrap();
        let ip = TRUSTED.extract(&req).unwrap();
        assert_eq!(ip, "192.0.2.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_no_address_is_an_error() {
        let req = Request::builder()
            .header("x-real-ip", "203.0.113.99")
            .body(Body::empty())
            .unwrap();
        assert!(UNTRUSTED.extract(&req).is_err());
        assert!(TRUSTED
            .extract(&Request::builder().body(Body::empty()).unwrap())
            .is_err());
    }

    #[tokio::test]
    async fn test_rejection_uses_error_envelope() {
        let response = rejection_response(GovernorError::TooManyRequests {
            wait_time: 4,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "4");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Too many requests");
    }

    #[tokio::test]
    async fn test_missing_key_is_a_server_error() {
        let response = rejection_response(GovernorError::UnableToExtractKey);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
