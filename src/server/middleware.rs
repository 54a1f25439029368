use axum::extract::{ Request, State };
use axum::http::{ header, HeaderValue };
use axum::middleware::Next;
use axum::response::{ IntoResponse, Response };
use log::{ info, warn };
use std::sync::atomic::Ordering;
use std::time::Instant;
use tower_http::cors::{ AllowHeaders, AllowMethods, Any, CorsLayer };

use super::AppState;
use crate::cli::Args;
use crate::error::ApiError;

pub const X_PROCESS_TIME: &str = "x-process-time";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Numbers every request and stamps the response with its number and elapsed seconds.
pub async fn log_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let request_number = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
    let start = Instant::now();
    info!("Request {}: {} {}", request_number, req.method(), req.uri());

    let mut response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    info!("Response {}: {} ({:.3}s)", request_number, response.status().as_u16(), elapsed);

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&elapsed.to_string()) {
        headers.insert(X_PROCESS_TIME, value);
    }
    headers.insert(X_REQUEST_ID, HeaderValue::from(request_number));
    response
}

/// `*` allows any host, `*.example.com` any subdomain of it; other entries match exactly.
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|pattern| {
        if pattern == "*" {
            true
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            host.ends_with(suffix)
        } else {
            host == pattern
        }
    })
}

fn request_host(req: &Request) -> String {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or("");
    // Drop the port; bracketed IPv6 literals keep their colons.
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !port.contains(']') => host.to_string(),
        _ => raw.to_string(),
    }
}

pub async fn trusted_host(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let host = request_host(&req);
    if !host_allowed(&host, &state.args.hosts()) {
        warn!("Rejected request with untrusted host '{}'", host);
        return ApiError::BadRequest("Invalid host header".to_string()).into_response();
    }
    next.run(req).await
}

/// Global ingress budget shared by every client.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.limiter.check().is_err() {
        warn!("Rate limit exceeded for {} {}", req.method(), req.uri());
        return ApiError::TooManyRequests("Rate limit exceeded".to_string()).into_response();
    }
    next.run(req).await
}

pub fn cors_layer(args: &Args) -> CorsLayer {
    let configured = args.origins();
    if configured.is_empty() || configured.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    // Credentials rule out wildcards, so headers and methods are mirrored instead.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_credentials(true)
}
