use axum::extract::State;
use axum::routing::get;
use axum::{ Json, Router };
use chrono::Utc;
use serde::Deserialize;
use serde_json::{ json, Value };

use super::AppState;
use crate::error::{ ApiError, AppPath, AppQuery };
use crate::models::awareness::{
    AwarenessCatalogue,
    ContentFilter,
    ContentSelection,
    ProgressRecord,
    Recommendations,
    SafetyQuiz,
    SafetyStory,
    SearchResults,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/awareness", get(all))
        .route("/api/awareness/", get(all))
        .route("/api/awareness/age-group/{age_group}", get(by_age_group))
        .route("/api/awareness/tags", get(by_tags))
        .route("/api/awareness/stories/{story_id}", get(story))
        .route("/api/awareness/quizzes/{quiz_id}", get(quiz))
        .route("/api/awareness/progress/{user_id}/{content_id}", get(progress).post(update_progress))
        .route("/api/awareness/recommendations/{user_id}", get(recommendations))
        .route("/api/awareness/search", get(search))
        .route("/api/awareness/content", get(content))
        .route("/api/awareness/health", get(health))
}

/// Splits a comma-separated query value, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

async fn all(State(state): State<AppState>) -> Json<AwarenessCatalogue> {
    Json(state.awareness.catalogue().clone())
}

async fn by_age_group(
    State(state): State<AppState>,
    AppPath(age_group): AppPath<String>
) -> Json<ContentSelection> {
    Json(state.awareness.by_age_group(&age_group))
}

#[derive(Debug, Deserialize)]
struct TagsQuery {
    tags: String,
}

async fn by_tags(State(state): State<AppState>, AppQuery(query): AppQuery<TagsQuery>) -> Json<ContentSelection> {
    Json(state.awareness.by_tags(&split_list(&query.tags)))
}

async fn story(
    State(state): State<AppState>,
    AppPath(story_id): AppPath<String>
) -> Result<Json<SafetyStory>, ApiError> {
    state.awareness
        .story(&story_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Safety story not found".to_string()))
}

async fn quiz(
    State(state): State<AppState>,
    AppPath(quiz_id): AppPath<String>
) -> Result<Json<SafetyQuiz>, ApiError> {
    state.awareness
        .quiz(&quiz_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Safety quiz not found".to_string()))
}

async fn progress(
    State(state): State<AppState>,
    AppPath((user_id, content_id)): AppPath<(String, String)>
) -> Json<ProgressRecord> {
    Json(state.awareness.progress(&user_id, &content_id).await)
}

#[derive(Debug, Deserialize)]
struct ProgressUpdate {
    progress: u32,
    #[serde(default)]
    score: Option<i64>,
}

async fn update_progress(
    State(state): State<AppState>,
    AppPath((user_id, content_id)): AppPath<(String, String)>,
    AppQuery(update): AppQuery<ProgressUpdate>
) -> Json<ProgressRecord> {
    Json(state.awareness.update_progress(&user_id, &content_id, update.progress, update.score).await)
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    age_group: String,
    #[serde(default)]
    completed_content: String,
}

async fn recommendations(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
    AppQuery(query): AppQuery<RecommendationQuery>
) -> Json<Recommendations> {
    let completed = split_list(&query.completed_content);
    Json(state.awareness.recommendations(&user_id, &query.age_group, &completed))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
}

async fn search(State(state): State<AppState>, AppQuery(query): AppQuery<SearchQuery>) -> Json<SearchResults> {
    Json(state.awareness.search(&query.query))
}

async fn content(State(state): State<AppState>, AppQuery(filter): AppQuery<ContentFilter>) -> Json<ContentSelection> {
    Json(state.awareness.filtered(&filter))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let catalogue = state.awareness.catalogue();
    Json(json!({
        "status": "healthy",
        "service": "awareness",
        "timestamp": Utc::now().to_rfc3339(),
        "total_stories": catalogue.stories.len(),
        "total_quizzes": catalogue.quizzes.len(),
        "total_resources": catalogue.resources.len(),
    }))
}
