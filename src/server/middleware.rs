//! Request admission and response hygiene.
//!
//! A single gate applies the per-client rate limit and the request
//! size ceiling before any handler runs, mirroring the data flow rule
//! that admission is checked before the envelope is even parsed.
//! Responses pick up a fixed set of security headers on the way out.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::rpc::JsonRpcResponse;

use super::AppState;

/// Client identity used for admission windows.
///
/// Prefers proxy-supplied headers so deployments behind a load
/// balancer keep one window per originating client, falling back to
/// the peer address.
fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_owned();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |info| info.0.ip().to_string())
}

/// Admission gate plus security headers for every route.
///
/// Rejections happen before the body is read, so the rate-limit
/// envelope always carries a null request id.
pub async fn security_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);

    let admission = state.limiter.admit(&client);
    if let crate::admission::Admission::Rejected { retry_after } = admission {
        warn!(client = %client, retry_after, "rate limit exceeded");
        return rate_limited_response(&state, retry_after);
    }

    if let Some(length) = request.headers().get(header::CONTENT_LENGTH) {
        let within = length
            .to_str()
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .is_some_and(|size| size <= state.config.limits.max_request_size);
        if !within {
            warn!(client = %client, "request body exceeds size ceiling");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request entity too large").into_response();
        }
    }

    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), state.config.limits.rate_limit_rpm);
    response
}

/// 429 response carrying both the HTTP retry hint and a JSON-RPC
/// error envelope so protocol clients see a well-formed rejection.
fn rate_limited_response(state: &AppState, retry_after: u64) -> Response {
    let envelope =
        JsonRpcResponse::from_app_error(Value::Null, &AppError::RateLimited { retry_after });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(envelope)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        headers.insert("retry-after", value);
    }
    if let Ok(value) = HeaderValue::from_str(&state.config.limits.rate_limit_rpm.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    response
}

/// Fixed response header set plus the advertised rate-limit ceiling.
fn apply_security_headers(headers: &mut HeaderMap, rpm_ceiling: u32) {
    const STATIC_HEADERS: &[(&str, &str)] = &[
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("x-xss-protection", "1; mode=block"),
        ("strict-transport-security", "max-age=31536000; includeSubDomains"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        ("content-security-policy", "default-src 'self'"),
        ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ];
    for &(name, value) in STATIC_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if let Ok(value) = HeaderValue::from_str(&rpm_ceiling.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
}

/// One log line per request with latency, warning on slow handlers.
pub async fn request_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();
    if duration_ms >= state.config.timeouts.slow_request_millis {
        warn!(%method, path = %path, status, duration_ms, "slow request");
    } else {
        info!(%method, path = %path, status, duration_ms, "request processed");
    }
    response
}
