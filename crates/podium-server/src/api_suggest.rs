//! Answer suggestion API handler.

use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podium_suggest::Suggestion;
use serde::Deserialize;
use std::sync::Arc;

/// Request body for `POST /api/suggest`.
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub question: String,
}

/// Handler for `POST /api/suggest`.
///
/// Returns a confidence-scored answer suggestion for the given question
/// text. Never fails on gateway trouble; the suggester degrades to its
/// deterministic fallback internally.
pub async fn suggest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<SuggestRequest>,
) -> Result<Json<Suggestion>, Response> {
    let question = body.question.trim();
    if question.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "question must not be empty" })),
        )
            .into_response());
    }

    let suggestion = state.suggester.suggest(question).await;
    Ok(Json(suggestion))
}
