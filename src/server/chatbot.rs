use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{ get, post };
use axum::{ Json, Router };
use chrono::Utc;
use log::error;
use serde::Deserialize;
use serde_json::{ json, Value };

use super::AppState;
use crate::error::{ check_length, reject_if_any, ApiError, AppJson, AppPath, AppQuery };
use crate::models::chat::{ AnalyzeRequest, ChatHistory, ChatRequest, ChatResponse, SessionSummary };
use crate::services::chat::ChatError;

const MAX_MESSAGE_CHARS: usize = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chatbot", post(chat))
        .route("/api/chatbot/chat", post(chat))
        .route("/api/chatbot/sessions", get(list_sessions))
        .route("/api/chatbot/sessions/{session_id}", get(get_session).delete(delete_session))
        .route("/api/chatbot/sessions/{session_id}/history", get(history))
        .route("/api/chatbot/sessions/{session_id}/clear", post(clear_history))
        .route("/api/chatbot/analyze", post(analyze))
        .route("/api/chatbot/health", get(health))
        .route("/api/chatbot/stats", get(stats))
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::InvalidInput(detail) => ApiError::BadRequest(detail),
            ChatError::SessionNotFound => ApiError::NotFound("Session not found".to_string()),
            ChatError::Store(e) => ApiError::Internal(format!("session store: {}", e)),
        }
    }
}

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<ChatRequest>
) -> Result<Json<ChatResponse>, ApiError> {
    let mut errors = Vec::new();
    check_length("message", &req.message, 1, MAX_MESSAGE_CHARS, &mut errors);
    reject_if_any(errors)?;

    Ok(Json(state.chat.chat(req, user_id(&headers)).await?))
}

#[derive(Debug, Deserialize)]
struct SessionPage {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_sessions(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<SessionPage>
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let limit = page.limit.unwrap_or(20);
    let offset = page.offset.unwrap_or(0);
    if !(1..=100).contains(&limit) {
        return Err(ApiError::BadRequest("Limit must be between 1 and 100".to_string()));
    }
    if offset < 0 {
        return Err(ApiError::BadRequest("Offset must be non-negative".to_string()));
    }
    Ok(Json(state.chat.list(limit as usize, offset as usize).await?))
}

async fn get_session(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<String>
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(state.chat.session(&session_id).await?))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn history(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<String>,
    AppQuery(query): AppQuery<HistoryQuery>
) -> Result<Json<ChatHistory>, ApiError> {
    // Unknown sessions are reported before a bad limit.
    state.chat.session(&session_id).await?;
    let limit = query.limit.unwrap_or(50);
    if !(1..=100).contains(&limit) {
        return Err(ApiError::BadRequest("Limit must be between 1 and 100".to_string()));
    }
    Ok(Json(state.chat.history(&session_id, limit as usize).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<String>
) -> Result<Json<Value>, ApiError> {
    state.chat.delete(&session_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Session {} deleted successfully", session_id),
    })))
}

async fn clear_history(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<String>
) -> Result<Json<Value>, ApiError> {
    let removed = state.chat.clear(&session_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Chat history cleared for session {}", session_id),
        "messages_removed": removed,
    })))
}

async fn analyze(
    State(state): State<AppState>,
    AppJson(req): AppJson<AnalyzeRequest>
) -> Result<Json<Value>, ApiError> {
    let analysis_type = req.analysis_type.filter(|t| !t.is_empty()).unwrap_or_else(|| "general".to_string());
    let analysis = state.chat.analyze(&req.concern_text, &analysis_type).await?;
    Ok(Json(json!({
        "success": analysis.success,
        "analysis": analysis.analysis,
        "analysis_type": analysis_type,
        "risk_level": analysis.risk_level,
        "recommendations": analysis.recommendations,
        "timestamp": Utc::now().to_rfc3339(),
        "fallback": analysis.fallback,
    })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let gpt_health = state.gpt.health().await;
    match state.chat.counts().await {
        Ok((sessions, _)) => {
            let status = if matches!(gpt_health.status.as_str(), "healthy" | "available") {
                "healthy"
            } else {
                "degraded"
            };
            Json(json!({
                "status": status,
                "service": "Chatbot API",
                "gpt_service": gpt_health,
                "sessions": sessions,
                "session_store": state.chat.store_kind(),
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
        Err(e) => {
            error!("Error in chatbot health check: {}", e);
            Json(json!({
                "status": "unhealthy",
                "service": "Chatbot API",
                "error": e.to_string(),
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (sessions, messages) = state.chat.counts().await?;
    Ok(Json(json!({
        "sessions": sessions,
        "messages": messages,
        "gpt_service": state.gpt.usage_stats().await,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
