mod common;

use axum::body::Body;
use axum::http::{ header, Request };
use clap::Parser;
use safechild_backend::cli::Args;
use serde_json::json;

#[tokio::test]
async fn unknown_route_lists_available_routes() {
    let app = common::app().await;
    let (status, body) = app.get("/api/nowhere").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "Route '/api/nowhere' not found");
    assert!(!body["available_routes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn responses_carry_request_id_and_timing() {
    let app = common::app().await;
    let response = app.send(common::request("GET", "/health", None)).await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-process-time"));

    let (_, metrics) = app.get("/api/metrics").await;
    assert!(metrics["total_requests"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn untrusted_host_is_rejected() {
    let app = common::app().await;
    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "evil.example.com")
        .body(Body::empty())
        .unwrap();
    let (status, body) = common::split(app.send(request).await).await;
    assert_eq!(status, 400);
    assert_eq!(body["detail"], "Invalid host header");
}

#[tokio::test]
async fn burst_over_quota_is_rate_limited() {
    let args = Args::parse_from(["safechild-backend", "--requests-per-second", "1"]);
    let app = common::app_with(args, true).await;

    let (first, _) = app.get("/").await;
    assert_eq!(first, 200);
    let (second, body) = app.get("/").await;
    assert_eq!(second, 429);
    assert_eq!(body["detail"], "Rate limit exceeded");
}

#[tokio::test]
async fn status_lists_every_service() {
    let app = common::app().await;
    let (status, body) = app.get("/api/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["total_services"], 6);
}

#[tokio::test]
async fn unknown_ai_provider_is_rejected() {
    let app = common::app().await;

    let (status, current) = app.get("/api/config/ai").await;
    assert_eq!(status, 200);
    assert_eq!(current["provider"], "aiml");

    let (status, body) = app.post("/api/config/ai", json!({ "provider": "skynet" })).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("Unsupported provider"));

    let (status, health) = app.get("/api/config/ai/health").await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "healthy");
}
