//! Request authentication middleware.
//!
//! Identification is header-based: `X-Podium-User` or `Authorization:
//! Bearer <username>` carries the username (or email) of a registered
//! user. There is no password or session layer; the dashboard trusts its
//! deployment boundary and the header acts as the bearer credential.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use podium_types::User;
use std::sync::Arc;

use crate::AppState;

/// Wrapper for the authenticated [`User`] stored in request extensions.
#[derive(Clone, Debug)]
pub struct ActorContext(pub User);

/// Extracts the identifier from `X-Podium-User` or a bearer token.
fn extract_identifier(req: &Request<Body>) -> Option<Result<String, StatusCode>> {
    if let Some(val) = req.headers().get("X-Podium-User") {
        return Some(
            val.to_str()
                .map(str::to_string)
                .map_err(|_| StatusCode::UNAUTHORIZED),
        );
    }
    if let Some(val) = req.headers().get("Authorization") {
        let parsed = val
            .to_str()
            .map_err(|_| StatusCode::UNAUTHORIZED)
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .map(str::to_string)
                    .ok_or(StatusCode::UNAUTHORIZED)
            });
        return Some(parsed);
    }
    None
}

/// Looks up the user the request identifies itself as.
///
/// Returns `Ok(None)` when the request carries no identity header at
/// all; an identity that is present but unknown is an error.
pub fn resolve_actor(
    state: &Arc<AppState>,
    req: &Request<Body>,
) -> impl std::future::Future<Output = Result<Option<User>, StatusCode>> + Send + 'static {
    // Borrow the request only before the future is returned: `Body` is
    // not `Sync`, so holding `&Request` across an await would make the
    // future non-`Send` and unusable as part of an axum handler.
    let identifier = extract_identifier(req);
    let pool = state.pool.clone();

    async move {
        let identifier = match identifier {
            Some(result) => result?,
            None => return Ok(None),
        };

        let user = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            // Any lookup failure, including "not found", reads as unauthorized.
            podium_store::get_user_by_identifier(&conn, &identifier)
                .map_err(|_| StatusCode::UNAUTHORIZED)
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

        Ok(Some(user))
    }
}

/// Middleware that requires an authenticated user.
///
/// Inserts an [`ActorContext`] into request extensions on success.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let user = resolve_actor(&state, &req)
        .await?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(ActorContext(user));
    Ok(next.run(req).await)
}
