//! Podium server library logic.
//!
//! Wires the lifecycle manager, broadcaster, store, and suggestion
//! gateway into an axum application: REST endpoints for questions,
//! answers, users, and suggestions, plus a WebSocket endpoint streaming
//! lifecycle events to dashboard clients.

pub mod api_answers;
pub mod api_questions;
pub mod api_suggest;
pub mod api_users;
pub mod api_ws;
pub mod config;
pub mod middleware;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use podium_broadcast::Broadcaster;
use podium_db::DbPool;
use podium_lifecycle::{LifecycleError, LifecycleManager};
use podium_suggest::Suggester;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Observer registry for lifecycle event fan-out.
    pub broadcaster: Broadcaster,
    /// Question lifecycle manager.
    pub lifecycle: Arc<LifecycleManager>,
    /// Answer suggestion gateway.
    pub suggester: Arc<dyn Suggester>,
}

/// Maximum request body size. Question and answer payloads are small;
/// anything larger is rejected outright.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Maps a lifecycle error onto an HTTP response.
///
/// Validation, not-found, and authorization failures carry their message
/// through; store and internal failures are logged and collapse to an
/// opaque 500.
pub(crate) fn lifecycle_error_response(err: LifecycleError) -> Response {
    let (status, message) = match &err {
        LifecycleError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
        LifecycleError::NotFound(id) => {
            (StatusCode::NOT_FOUND, format!("question {id} not found"))
        }
        LifecycleError::Unauthorized(_) => (
            StatusCode::FORBIDDEN,
            "moderator privileges required".to_string(),
        ),
        LifecycleError::Unavailable(_) | LifecycleError::Store(_) | LifecycleError::Internal(_) => {
            tracing::error!(error = %err, "lifecycle operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

/// Health check handler.
///
/// Returns `200 OK` with server status, version, and the number of live
/// dashboard observers.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "observers": state.broadcaster.observer_count().await,
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/me", get(api_users::me_handler))
        .route(
            "/api/questions/{questionId}/status",
            axum::routing::patch(api_questions::update_status_handler),
        )
        .route("/api/suggest", post(api_suggest::suggest_handler))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(api_users::register_handler))
        .route(
            "/api/questions",
            post(api_questions::create_question_handler)
                .get(api_questions::list_questions_handler),
        )
        .route(
            "/api/questions/{questionId}",
            get(api_questions::get_question_handler),
        )
        .route(
            "/api/questions/{questionId}/answers",
            get(api_answers::list_answers_handler)
                .post(api_answers::create_answer_handler),
        )
        .merge(protected_routes)
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
