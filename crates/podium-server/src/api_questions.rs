//! Question API handlers.

use crate::middleware::{resolve_actor, ActorContext};
use crate::{lifecycle_error_response, AppState};
use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use podium_types::{Author, Question, QuestionStatus, QuestionView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /api/questions`.
#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub message: String,
    pub category: Option<String>,
    /// Display name for unauthenticated submitters. Ignored when the
    /// request carries an identity header.
    pub username: Option<String>,
}

/// Query parameters for `GET /api/questions`.
#[derive(Debug, Deserialize)]
pub struct ListQuestionsQuery {
    /// Restrict to one category. `All` (or absence) means no filter.
    pub category: Option<String>,
}

/// Request body for `PATCH /api/questions/{questionId}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Response wrapper for `GET /api/questions`.
#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<QuestionView>,
    pub count: usize,
}

/// Handler for `POST /api/questions`.
///
/// Open to guests: an identity header attributes the question to that
/// user, otherwise the optional `username` field (default "Guest")
/// names the submitter.
pub async fn create_question_handler(
    Extension(state): Extension<Arc<AppState>>,
    req: Request<Body>,
) -> Result<(StatusCode, Json<Question>), Response> {
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
    let payload: CreateQuestionRequest = serde_json::from_slice(&body).map_err(|e| {
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

    let question = state
        .lifecycle
        .submit_question(author, &payload.message, payload.category)
        .await
        .map_err(lifecycle_error_response)?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Handler for `GET /api/questions`.
///
/// Returns questions in triage order (escalated first, then newest
/// first) with live answer counts.
pub async fn list_questions_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListQuestionsQuery>,
) -> Result<Json<QuestionsResponse>, Response> {
    let category = params
        .category
        .filter(|c| !c.trim().is_empty() && !c.eq_ignore_ascii_case("all"));

    let questions = state
        .lifecycle
        .list_questions(category)
        .await
        .map_err(lifecycle_error_response)?;

    let count = questions.len();
    Ok(Json(QuestionsResponse { questions, count }))
}

/// Handler for `GET /api/questions/{questionId}`.
pub async fn get_question_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(question_id): Path<i64>,
) -> Result<Json<Question>, Response> {
    let question = state
        .lifecycle
        .get_question(question_id)
        .await
        .map_err(lifecycle_error_response)?;
    Ok(Json(question))
}

/// Handler for `PATCH /api/questions/{questionId}/status`.
///
/// Moderator-only triage transition; an unknown status string is a
/// validation failure, a non-moderator actor gets `403 Forbidden`.
pub async fn update_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ActorContext(actor)): Extension<ActorContext>,
    Path(question_id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Question>, Response> {
    let status: QuestionStatus = body.status.parse().map_err(|_| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": format!(
                    "invalid status: {}. Expected one of: Pending, Escalated, Answered",
                    body.status
                )
            })),
        )
            .into_response()
    })?;

    let question = state
        .lifecycle
        .update_status(question_id, status, &actor)
        .await
        .map_err(lifecycle_error_response)?;

    Ok(Json(question))
}
