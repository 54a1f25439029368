use axum::extract::State;
use axum::routing::get;
use axum::{ Json, Router };
use chrono::Utc;
use serde_json::{ json, Value };
use std::sync::atomic::Ordering;

use super::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/environment", get(environment))
        .route("/api/metrics", get(metrics))
}

/// "just now", "5 minutes ago", "2 hours ago" and so on.
pub fn relative_time(seconds: f64) -> String {
    fn plural(n: u64, unit: &str) -> String {
        format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
    }

    if seconds < 0.0 {
        return "in the future".to_string();
    }
    let secs = seconds as u64;
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => plural(secs / 60, "minute"),
        3_600..=86_399 => plural(secs / 3_600, "hour"),
        86_400..=2_591_999 => plural(secs / 86_400, "day"),
        2_592_000..=31_535_999 => plural(secs / 2_592_000, "month"),
        _ => plural(secs / 31_536_000, "year"),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to SafeChild-Lite Backend API",
        "version": VERSION,
        "description": "Child safety application backend",
        "status": "active",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.started.elapsed().as_secs_f64();
    Json(json!({
        "status": "healthy",
        "service": "safechild-lite-backend",
        "version": VERSION,
        "uptime_seconds": round2(uptime),
        "uptime_formatted": relative_time(uptime),
        "total_requests": state.requests.load(Ordering::Relaxed),
        "timestamp": Utc::now().to_rfc3339(),
        "utilities": {
            "time_utils": "active",
            "text_cleaner": "active",
        },
    }))
}

async fn status() -> Json<Value> {
    let services = json!({
        "chatbot": { "endpoint": "/api/chatbot/health", "status": "active" },
        "complaint": { "endpoint": "/api/complaint/health", "status": "active" },
        "emergency": { "endpoint": "/api/emergency/health", "status": "active" },
        "awareness": { "endpoint": "/api/awareness/health", "status": "active" },
        "tts": { "endpoint": "/api/tts/health", "status": "active" },
        "config": { "endpoint": "/api/config/ai/health", "status": "active" },
    });
    let total = services.as_object().map(|s| s.len()).unwrap_or(0);
    Json(json!({
        "status": "active",
        "services": services,
        "total_services": total,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn environment(State(state): State<AppState>) -> Json<Value> {
    let args = &state.args;
    Json(json!({
        "environment": {
            "APP_ENV": args.app_env,
            "PLATFORM": std::env::consts::OS,
            "DEPLOYMENT": args.deployment,
        },
        "services_configured": {
            "openai": !args.openai_api_key.is_empty(),
            "ai_provider": args.ai_provider,
            "twilio": args.twilio_configured(),
            "tts": true,
            "pdf": true,
            "session_store": args.session_store,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.started.elapsed().as_secs_f64();
    let requests = state.requests.load(Ordering::Relaxed);
    let per_minute = if uptime > 0.0 { (requests as f64) / (uptime / 60.0) } else { 0.0 };
    Json(json!({
        "uptime_seconds": round2(uptime),
        "uptime_formatted": relative_time(uptime),
        "total_requests": requests,
        "requests_per_minute": round2(per_minute),
        "startup_time": state.started_at.to_rfc3339(),
        "current_time": Utc::now().to_rfc3339(),
    }))
}
