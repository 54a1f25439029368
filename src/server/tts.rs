use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{ get, post };
use axum::{ Json, Router };
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::info;
use serde::{ Deserialize, Serialize };

use super::{ AppState, AudioPayload };
use crate::error::{ check_length, reject_if_any, ApiError, AppJson, AppPath };
use crate::services::tts::{ LanguageList, SafetyTtsResult, TtsHealth, TtsResult };
use uuid::Uuid;

const MAX_TEXT_CHARS: usize = 5000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tts", post(synthesize))
        .route("/api/tts/", post(synthesize))
        .route("/api/tts/audio/{audio_id}", get(audio))
        .route("/api/tts/safety", post(safety))
        .route("/api/tts/batch", post(batch))
        .route("/api/tts/languages", get(languages))
        .route("/api/tts/health", get(health))
}

#[derive(Debug, Deserialize)]
struct TtsRequest {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speed: Option<String>,
    /// Accepted for compatibility; there is a single voice per language.
    #[serde(default)]
    #[allow(dead_code)]
    voice: Option<String>,
}

fn is_slow(speed: Option<&str>) -> bool {
    speed.map(|s| s.eq_ignore_ascii_case("slow")).unwrap_or(false)
}

fn encode(result: &TtsResult) -> Option<String> {
    result.audio.as_ref().map(|audio| STANDARD.encode(audio))
}

/// Unsupported languages are the caller's mistake; anything else is ours.
fn failure(result: &TtsResult) -> ApiError {
    let detail = result.error.clone().unwrap_or_else(|| "TTS failed".to_string());
    if result.is_unsupported_language() {
        ApiError::BadRequest(detail)
    } else {
        ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

async fn synthesize(
    State(state): State<AppState>,
    AppJson(req): AppJson<TtsRequest>
) -> Result<Json<AudioPayload>, ApiError> {
    let mut errors = Vec::new();
    check_length("text", &req.text, 1, MAX_TEXT_CHARS, &mut errors);
    reject_if_any(errors)?;

    let result = state.tts.convert(
        &req.text,
        req.language.as_deref(),
        Some(is_slow(req.speed.as_deref())),
        None
    ).await;
    if !result.success {
        return Err(failure(&result));
    }

    let payload = AudioPayload {
        audio_id: format!("audio_{}", Uuid::new_v4().simple()),
        audio_data: encode(&result).unwrap_or_default(),
        format: result.format.clone(),
        duration: result.estimated_duration_seconds,
        file_size: result.audio_size,
        cached: result.cached,
    };
    state.audio.write().await.insert(payload.audio_id.clone(), payload.clone());
    info!("Synthesized {} ({} bytes, cached: {})", payload.audio_id, payload.file_size, payload.cached);
    Ok(Json(payload))
}

async fn audio(
    State(state): State<AppState>,
    AppPath(audio_id): AppPath<String>
) -> Result<Json<AudioPayload>, ApiError> {
    state.audio
        .read().await
        .get(&audio_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Audio not found".to_string()))
}

#[derive(Debug, Deserialize)]
struct SafetyRequest {
    message: String,
    #[serde(default = "default_urgency")]
    urgency_level: String,
    #[serde(default = "default_target_age")]
    target_age: String,
}

fn default_urgency() -> String {
    "normal".to_string()
}

fn default_target_age() -> String {
    "child".to_string()
}

#[derive(Debug, Serialize)]
struct SafetyAudio {
    #[serde(flatten)]
    result: SafetyTtsResult,
    audio_data: Option<String>,
}

async fn safety(
    State(state): State<AppState>,
    AppJson(req): AppJson<SafetyRequest>
) -> Result<Json<SafetyAudio>, ApiError> {
    let mut errors = Vec::new();
    check_length("message", &req.message, 1, MAX_TEXT_CHARS, &mut errors);
    reject_if_any(errors)?;

    let result = state.tts.convert_safety_message(&req.message, &req.urgency_level, &req.target_age).await;
    if !result.result.success {
        return Err(failure(&result.result));
    }
    Ok(Json(SafetyAudio { audio_data: encode(&result.result), result }))
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    texts: Vec<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speed: Option<String>,
}

#[derive(Debug, Serialize)]
struct EncodedResult<'a> {
    #[serde(flatten)]
    result: &'a TtsResult,
    audio_data: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchAudio<'a> {
    success: bool,
    total_texts: usize,
    successful_conversions: usize,
    failed_conversions: usize,
    results: Vec<EncodedResult<'a>>,
    timestamp: &'a str,
}

async fn batch(
    State(state): State<AppState>,
    AppJson(req): AppJson<BatchRequest>
) -> Result<Json<serde_json::Value>, ApiError> {
    let slow = req.speed.as_deref().map(|s| is_slow(Some(s)));
    let outcome = state.tts.batch_convert(&req.texts, req.language.as_deref(), slow).await;
    if let Some(error) = outcome.error.clone() {
        return Err(ApiError::BadRequest(error));
    }

    let body = BatchAudio {
        success: outcome.success,
        total_texts: outcome.total_texts,
        successful_conversions: outcome.successful_conversions,
        failed_conversions: outcome.failed_conversions,
        results: outcome.results
            .iter()
            .map(|result| EncodedResult { result, audio_data: encode(result) })
            .collect(),
        timestamp: &outcome.timestamp,
    };
    serde_json
        ::to_value(&body)
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("serializing batch result: {}", e)))
}

async fn languages(State(state): State<AppState>) -> Json<LanguageList> {
    Json(state.tts.languages())
}

async fn health(State(state): State<AppState>) -> Json<TtsHealth> {
    Json(state.tts.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_slow_means_slow() {
        assert!(is_slow(Some("SLOW")));
        assert!(!is_slow(Some("normal")));
        assert!(!is_slow(None));
    }
}
