use axum::extract::State;
use axum::routing::get;
use axum::{ Json, Router };
use serde::{ Deserialize, Serialize };

use super::AppState;
use crate::error::{ ApiError, AppJson };
use crate::llm::chat::ProviderHealth;
use crate::llm::manager::{ AiConfigView, ProviderOverrides };

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/config/ai", get(current).post(switch_provider))
        .route("/api/config/ai/health", get(health))
}

#[derive(Debug, Deserialize)]
struct ProviderChoice {
    provider: String,
    #[serde(default)]
    config: Option<ProviderOverrides>,
}

#[derive(Debug, Serialize)]
struct Switched {
    success: bool,
    #[serde(flatten)]
    view: AiConfigView,
}

async fn current(State(state): State<AppState>) -> Json<AiConfigView> {
    Json(state.ai.get_config().await)
}

async fn switch_provider(
    State(state): State<AppState>,
    AppJson(choice): AppJson<ProviderChoice>
) -> Result<Json<Switched>, ApiError> {
    let view = state.ai
        .set_provider(&choice.provider, choice.config).await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(Switched { success: true, view }))
}

async fn health(State(state): State<AppState>) -> Json<ProviderHealth> {
    Json(state.ai.health().await)
}
