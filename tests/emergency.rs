mod common;

use serde_json::json;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn trigger_notifies_contacts_and_counts_in_statistics() {
    let app = common::app().await;

    let (status, body) = app.post(
        "/api/emergency",
        json!({
            "location": "Main St park",
            "description": "My friend is hurt and bleeding",
            "contacts": [{ "name": "Mom", "phone": "+15551234567", "relationship": "parent" }],
        })
    ).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "active");
    assert_eq!(body["emergency_level"], "critical");
    assert_eq!(body["contacts_notified"][0]["status"], "sent");
    assert!(!body["next_steps"].as_array().unwrap().is_empty());
    assert_eq!(app.gateway.sent.load(Ordering::SeqCst), 1);

    let alert_id = body["alert_id"].as_str().unwrap().to_string();
    let (status, _) = app.put(&format!("/api/emergency/{}/status?status=resolved", alert_id)).await;
    assert_eq!(status, 200);

    let (status, stats) = app.get("/api/emergency/statistics").await;
    assert_eq!(status, 200);
    assert_eq!(stats["total_alerts"], 1);
    assert_eq!(stats["active_alerts"], 0);
    assert_eq!(stats["resolved_alerts"], 1);
    assert_eq!(stats["level_distribution"]["critical"], 1);
    assert_eq!(stats["last_24_hours"], 1);
}

#[tokio::test]
async fn alert_without_contacts_is_rejected() {
    let app = common::app().await;
    let (status, body) = app.post(
        "/api/emergency/",
        json!({ "location": "home", "description": "help", "contacts": [] })
    ).await;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("At least one emergency contact is required"));
    assert_eq!(app.gateway.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_alert_is_not_found() {
    let app = common::app().await;
    let (status, body) = app.get("/api/emergency/missing/status").await;
    assert_eq!(status, 404);
    assert_eq!(body["detail"], "Emergency alert not found");
}
