use axum::extract::State;
use axum::routing::get;
use axum::{ Json, Router };
use chrono::Utc;
use serde_json::{ json, Value };

use super::complaint::StatusQuery;
use super::AppState;
use crate::error::{ ApiError, AppJson, AppPath, AppQuery };
use crate::models::emergency::{ EmergencyAlert, EmergencyRequest, EmergencyResponse, EmergencyStatistics };

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/emergency", get(list).post(trigger))
        .route("/api/emergency/", get(list).post(trigger))
        .route("/api/emergency/statistics", get(statistics))
        .route("/api/emergency/health", get(health))
        .route("/api/emergency/{alert_id}", get(fetch).delete(remove))
        .route("/api/emergency/{alert_id}/status", get(status).put(update_status))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Emergency alert not found".to_string())
}

async fn trigger(
    State(state): State<AppState>,
    AppJson(req): AppJson<EmergencyRequest>
) -> Result<Json<EmergencyResponse>, ApiError> {
    let alert = state.emergencies.trigger(req).await.map_err(|errors| ApiError::validation_errors(&errors))?;
    Ok(Json(EmergencyResponse::from(&alert)))
}

async fn list(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "alerts": state.emergencies.list().await }))
}

async fn fetch(
    State(state): State<AppState>,
    AppPath(alert_id): AppPath<String>
) -> Result<Json<EmergencyAlert>, ApiError> {
    state.emergencies.get(&alert_id).await.map(Json).ok_or_else(not_found)
}

async fn status(
    State(state): State<AppState>,
    AppPath(alert_id): AppPath<String>
) -> Result<Json<Value>, ApiError> {
    let alert = state.emergencies.get(&alert_id).await.ok_or_else(not_found)?;
    Ok(Json(json!({
        "alert_id": alert.alert_id,
        "status": alert.status,
        "emergency_level": alert.emergency_level,
        "timestamp": alert.timestamp,
        "contacts_notified": alert.contacts_notified,
    })))
}

async fn update_status(
    State(state): State<AppState>,
    AppPath(alert_id): AppPath<String>,
    AppQuery(query): AppQuery<StatusQuery>
) -> Result<Json<EmergencyAlert>, ApiError> {
    state.emergencies.update_status(&alert_id, &query.status).await.map(Json).ok_or_else(not_found)
}

async fn remove(
    State(state): State<AppState>,
    AppPath(alert_id): AppPath<String>
) -> Result<Json<Value>, ApiError> {
    if state.emergencies.delete(&alert_id).await {
        Ok(Json(json!({ "message": "Emergency alert deleted successfully" })))
    } else {
        Err(not_found())
    }
}

async fn statistics(State(state): State<AppState>) -> Json<EmergencyStatistics> {
    Json(state.emergencies.statistics().await)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let (active, total) = state.emergencies.counts().await;
    Json(json!({
        "status": "healthy",
        "service": "emergency",
        "timestamp": Utc::now().to_rfc3339(),
        "active_alerts": active,
        "total_alerts": total,
        "sms": state.sms.usage_stats().await,
    }))
}
