mod common;

use clap::Parser;
use safechild_backend::cli::Args;
use serde_json::json;

#[tokio::test]
async fn chat_creates_session_and_records_both_turns() {
    let app = common::app().await;

    let (status, body) = app.post("/api/chatbot/chat", json!({ "message": "Someone online asked for my address" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["fallback"], false);
    assert_eq!(body["model_info"]["model"], "fake-1");
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(!session_id.is_empty());

    let (status, history) = app.get(&format!("/api/chatbot/sessions/{}/history", session_id)).await;
    assert_eq!(status, 200);
    assert_eq!(history["total_messages"], 2);
    assert_eq!(history["messages"][0]["role"], "user");
    assert_eq!(history["messages"][1]["role"], "assistant");

    let (status, summary) = app.get(&format!("/api/chatbot/sessions/{}", session_id)).await;
    assert_eq!(status, 200);
    assert_eq!(summary["user_id"], "anonymous");
}

#[tokio::test]
async fn provider_failure_falls_back() {
    let app = common::app_with(Args::parse_from(["safechild-backend"]), false).await;

    let (status, body) = app.post("/api/chatbot", json!({ "message": "hello" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["fallback"], true);
    assert!(body["model_info"].is_null());
    assert!(!body["response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn empty_message_is_unprocessable() {
    let app = common::app().await;
    let (status, body) = app.post("/api/chatbot/chat", json!({ "message": "" })).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "Validation Error");
}

#[tokio::test]
async fn unknown_session_and_bad_paging() {
    let app = common::app().await;

    let (status, body) = app.get("/api/chatbot/sessions/missing/history?limit=0").await;
    assert_eq!(status, 404);
    assert_eq!(body["detail"], "Session not found");

    let (status, body) = app.get("/api/chatbot/sessions?limit=500").await;
    assert_eq!(status, 400);
    assert_eq!(body["detail"], "Limit must be between 1 and 100");

    let (status, _) = app.delete("/api/chatbot/sessions/missing").await;
    assert_eq!(status, 404);
}
