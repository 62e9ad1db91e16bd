//! Answer API handlers.

use crate::middleware::resolve_actor;
use crate::{lifecycle_error_response, AppState};
use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use podium_types::{Answer, Author};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /api/questions/{questionId}/answers`.
#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub message: String,
    /// Display name for unauthenticated responders. Ignored when the
    /// request carries an identity header.
    pub username: Option<String>,
}

/// Response wrapper for `GET /api/questions/{questionId}/answers`.
#[derive(Debug, Serialize)]
pub struct AnswersResponse {
    pub answers: Vec<Answer>,
    pub count: usize,
}

/// Handler for `POST /api/questions/{questionId}/answers`.
///
/// Open to guests, same as question submission: an identity header
/// attributes the answer to that user, otherwise the optional
/// `username` field (default "Guest") names the responder.
pub async fn create_answer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(question_id): Path<i64>,
    req: Request<Body>,
) -> Result<(StatusCode, Json<Answer>), Response> {
    let actor = resolve_actor(&state, &req)
        .await
        .map_err(|status| status.into_response())?;

    let body = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("invalid body: {e}") })),
            )
                .into_response()
        })?;
    let payload: CreateAnswerRequest = serde_json::from_slice(&body).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": format!("invalid request body: {e}") })),
        )
            .into_response()
    })?;

    let author = match actor {
        Some(user) => Author::user(user.id, user.username),
        None => {
            let name = payload
                .username
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or("Guest");
            Author::guest(name)
        }
    };

    let answer = state
        .lifecycle
        .submit_answer(question_id, author, &payload.message)
        .await
        .map_err(lifecycle_error_response)?;

    Ok((StatusCode::CREATED, Json(answer)))
}

/// Handler for `GET /api/questions/{questionId}/answers`.
///
/// Returns the question's answers in conversation order. A missing
/// question is `404`, distinct from an empty answer list.
pub async fn list_answers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(question_id): Path<i64>,
) -> Result<Json<AnswersResponse>, Response> {
    let answers = state
        .lifecycle
        .list_answers(question_id)
        .await
        .map_err(lifecycle_error_response)?;

    let count = answers.len();
    Ok(Json(AnswersResponse { answers, count }))
}
