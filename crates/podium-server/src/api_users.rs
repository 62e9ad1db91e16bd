//! User registration and identity API handlers.

use crate::middleware::ActorContext;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podium_store::StoreError;
use podium_types::User;
use serde::Deserialize;
use std::sync::Arc;

/// Request body for `POST /api/users`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    /// Moderators can answer questions and change triage status.
    #[serde(default)]
    pub is_moderator: bool,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Handler for `POST /api/users`.
///
/// Registers a new user. Returns `409 Conflict` when the username or
/// email is already taken.
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), Response> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();
    if username.is_empty() || email.is_empty() {
        return Err(error_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            "username and email must not be empty",
        ));
    }

    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            // Pool exhaustion surfaces as a database-level failure.
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                Some(e.to_string()),
            ))
        })?;
        podium_store::create_user(&conn, &username, &email, body.is_moderator)
    })
    .await
    .map_err(|e| {
        error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
    })?
    .map_err(|e| match e {
        StoreError::Duplicate(name) => error_body(
            StatusCode::CONFLICT,
            format!("username or email already registered: {name}"),
        ),
        other => {
            tracing::error!("user registration failed: {}", other);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    })?;

    tracing::info!(user = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler for `GET /api/me`.
///
/// Returns the authenticated user's own record.
pub async fn me_handler(Extension(ActorContext(user)): Extension<ActorContext>) -> Json<User> {
    Json(user)
}
