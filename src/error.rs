//! HTTP-facing error type.
//!
//! Handlers return `Result<T, ApiError>`. Validation failures become 422 with
//! the list of violated rules, explicit HTTP failures carry their own status
//! and detail, and anything unexpected is logged and reported as a plain 500.

use axum::extract::rejection::{ JsonRejection, PathRejection, QueryRejection };
use axum::extract::{ FromRequest, FromRequestParts };
use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde::Serialize;
use serde_json::json;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or query did not match the expected shape.
    #[error("validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    /// A failure the handler chose to report with its own detail.
    #[error("http error {0}: {1}")]
    Status(StatusCode, String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Status(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400 carrying every violated rule, as the complaint and emergency
    /// endpoints report them.
    pub fn validation_errors(errors: &[String]) -> Self {
        ApiError::BadRequest(format!("Validation errors: {}", errors.join(", ")))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(details) =>
                json!({
                    "error": "Validation Error",
                    "details": details,
                    "message": "Invalid request data provided",
                }),
            ApiError::Internal(message) => {
                error!("Internal server error: {}", message);
                json!({
                    "error": "Internal Server Error",
                    "message": "An unexpected error occurred",
                })
            }
            | ApiError::BadRequest(detail)
            | ApiError::NotFound(detail)
            | ApiError::TooManyRequests(detail)
            | ApiError::Status(_, detail) =>
                json!({
                    "error": "HTTP Error",
                    "status_code": status.as_u16(),
                    "detail": detail,
                    "message": detail,
                }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for ApiError {
    fn from(e: Box<dyn StdError + Send + Sync>) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![rejection.body_text()])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(vec![rejection.body_text()])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![rejection.body_text()])
    }
}

/// `axum::Json` whose rejection renders as [`ApiError::Validation`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Length bounds on a request string, counted in characters.
pub fn check_length(field: &str, value: &str, min: usize, max: usize, errors: &mut Vec<String>) {
    let len = value.chars().count();
    if len < min {
        errors.push(format!("{}: must be at least {} characters", field, min));
    } else if len > max {
        errors.push(format!("{}: must be at most {} characters", field, max));
    }
}

/// Turns collected rule violations into a 422.
pub fn reject_if_any(errors: Vec<String>) -> Result<(), ApiError> {
    if errors.is_empty() { Ok(()) } else { Err(ApiError::Validation(errors)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_renders_details() {
        let (status, body) = body_json(ApiError::Validation(vec!["message: required".into()])).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Validation Error");
        assert_eq!(body["details"][0], "message: required");
        assert_eq!(body["message"], "Invalid request data provided");
    }

    #[tokio::test]
    async fn http_errors_carry_status_and_detail() {
        let (status, body) = body_json(ApiError::NotFound("Complaint not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "HTTP Error");
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["detail"], "Complaint not found");
        assert_eq!(body["message"], "Complaint not found");
    }

    #[tokio::test]
    async fn internal_errors_hide_the_cause() {
        let (status, body) = body_json(ApiError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(!body.to_string().contains("disk on fire"));
    }

    #[test]
    fn length_checks_collect_messages() {
        let mut errors = Vec::new();
        check_length("message", "", 1, 1000, &mut errors);
        check_length("name", "abcdef", 1, 5, &mut errors);
        assert_eq!(errors, vec![
            "message: must be at least 1 characters".to_string(),
            "name: must be at most 5 characters".to_string()
        ]);
        assert!(reject_if_any(errors).is_err());
        assert!(reject_if_any(Vec::new()).is_ok());
    }
}
