use axum::extract::State;
use axum::http::{ header, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, put };
use axum::{ Json, Router };
use chrono::Utc;
use log::error;
use serde::Deserialize;
use serde_json::{ json, Value };

use super::AppState;
use crate::error::{ ApiError, AppJson, AppPath, AppQuery };
use crate::models::complaint::{ ComplaintRecord, ComplaintRequest, ComplaintResponse };
use crate::services::document::DocumentFormat;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/complaint", get(list).post(submit))
        .route("/api/complaint/", get(list).post(submit))
        .route("/api/complaint/health", get(health))
        .route("/api/complaint/{complaint_id}", get(fetch).delete(remove))
        .route("/api/complaint/{complaint_id}/download/{format}", get(download))
        .route("/api/complaint/{complaint_id}/pdf", get(download_pdf))
        .route("/api/complaint/{complaint_id}/word", get(download_word))
        .route("/api/complaint/{complaint_id}/status", put(update_status))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Complaint not found".to_string())
}

async fn submit(
    State(state): State<AppState>,
    AppJson(req): AppJson<ComplaintRequest>
) -> Result<Json<ComplaintResponse>, ApiError> {
    let record = state.complaints.submit(req).await.map_err(|errors| ApiError::validation_errors(&errors))?;
    Ok(Json(ComplaintResponse::from(&record)))
}

async fn list(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "complaints": state.complaints.list().await }))
}

async fn fetch(
    State(state): State<AppState>,
    AppPath(complaint_id): AppPath<String>
) -> Result<Json<ComplaintRecord>, ApiError> {
    state.complaints.get(&complaint_id).await.map(Json).ok_or_else(not_found)
}

async fn render(state: &AppState, complaint_id: &str, format: DocumentFormat) -> Result<Response, ApiError> {
    let bytes = match state.complaints.render(complaint_id, format).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return Err(not_found());
        }
        Err(e) => {
            error!("Error generating {} for complaint {}: {}", format.extension(), complaint_id, e);
            return Err(
                ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, "Document generation failed".to_string())
            );
        }
    };

    let disposition = format!("attachment; filename=complaint_{}.{}", complaint_id, format.extension());
    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, bytes).into_response())
}

async fn download(
    State(state): State<AppState>,
    AppPath((complaint_id, format)): AppPath<(String, String)>
) -> Result<Response, ApiError> {
    let format = match format.as_str() {
        "pdf" => DocumentFormat::Pdf,
        "docx" => DocumentFormat::Docx,
        _ => {
            return Err(ApiError::BadRequest("Unsupported format".to_string()));
        }
    };
    render(&state, &complaint_id, format).await
}

async fn download_pdf(
    State(state): State<AppState>,
    AppPath(complaint_id): AppPath<String>
) -> Result<Response, ApiError> {
    render(&state, &complaint_id, DocumentFormat::Pdf).await
}

async fn download_word(
    State(state): State<AppState>,
    AppPath(complaint_id): AppPath<String>
) -> Result<Response, ApiError> {
    render(&state, &complaint_id, DocumentFormat::Docx).await
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

async fn update_status(
    State(state): State<AppState>,
    AppPath(complaint_id): AppPath<String>,
    AppQuery(query): AppQuery<StatusQuery>
) -> Result<Json<ComplaintRecord>, ApiError> {
    state.complaints.update_status(&complaint_id, &query.status).await.map(Json).ok_or_else(not_found)
}

async fn remove(
    State(state): State<AppState>,
    AppPath(complaint_id): AppPath<String>
) -> Result<Json<Value>, ApiError> {
    if state.complaints.delete(&complaint_id).await {
        Ok(Json(json!({ "message": "Complaint deleted successfully" })))
    } else {
        Err(not_found())
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "complaint",
        "timestamp": Utc::now().to_rfc3339(),
        "total_complaints": state.complaints.count().await,
    }))
}
