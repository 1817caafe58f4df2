//! Request pipeline middleware: client IP, timing, access log and API-key auth.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::AppState;
use mf_common::AppError;

pub const API_KEY_HEADER: &str = "x-m-api-key";
pub const API_SECRET_HEADER: &str = "x-m-api-secret";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time-ms";

/// Paths reachable without credentials.
const PUBLIC_PATHS: &[&str] = &["/healthz", "/healthz/"];

/// Caller address attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header("x-real-ip") {
        return real.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Record the client IP, time the request and emit one access-log line.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(req.headers(), peer);
    req.extensions_mut().insert(ClientIp(ip.clone()));

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(req).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}")) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms,
        client_ip = %ip,
        "Request completed"
    );

    response
}

fn header_bytes<'a>(headers: &'a HeaderMap, name: &str) -> &'a [u8] {
    headers.get(name).map(HeaderValue::as_bytes).unwrap_or_default()
}

/// Compare the shared-secret headers against configuration.
pub fn credentials_match(headers: &HeaderMap, api_key: &str, api_secret: &str) -> bool {
    let key_ok = header_bytes(headers, API_KEY_HEADER).ct_eq(api_key.as_bytes());
    let secret_ok = header_bytes(headers, API_SECRET_HEADER).ct_eq(api_secret.as_bytes());
    (key_ok & secret_ok).into()
}

/// Reject requests without valid `X-M-Api-Key` / `X-M-Api-Secret` headers.
///
/// Disabled when neither value is configured.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = &state.config;
    if !config.auth_enabled() || PUBLIC_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    if !credentials_match(req.headers(), &config.api_key, &config.api_secret) {
        let ip = req.extensions().get::<ClientIp>().map(|c| c.0.as_str());
        tracing::warn!(path = %req.uri().path(), client_ip = ?ip, "Rejected request with invalid API credentials");
        return Err(AppError::Unauthorized(
            "Invalid or missing API credentials".into(),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();
        let h = headers(&[("x-forwarded-for", "1.1.1.1, 2.2.2.2"), ("x-real-ip", "3.3.3.3")]);
        assert_eq!(client_ip(&h, Some(peer)), "1.1.1.1");

        let h = headers(&[("x-real-ip", "3.3.3.3")]);
        assert_eq!(client_ip(&h, Some(peer)), "3.3.3.3");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_credentials_match() {
        let good = headers(&[(API_KEY_HEADER, "key"), (API_SECRET_HEADER, "secret")]);
        assert!(credentials_match(&good, "key", "secret"));

        let wrong = headers(&[(API_KEY_HEADER, "wrong"), (API_SECRET_HEADER, "bad")]);
        assert!(!credentials_match(&wrong, "key", "secret"));

        let half = headers(&[(API_KEY_HEADER, "key")]);
        assert!(!credentials_match(&half, "key", "secret"));

        assert!(!credentials_match(&HeaderMap::new(), "key", "secret"));
    }
}
