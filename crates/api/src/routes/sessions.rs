//! Route definitions for the `/sessions` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// POST   /                 -> upload (multipart, field `file`)
/// POST   /{id}/chat        -> chat
/// GET    /{id}/detection   -> detection_status
/// DELETE /{id}             -> delete
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(sessions::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/{id}/chat", post(sessions::chat))
        .route("/{id}/detection", get(sessions::detection_status))
        .route("/{id}", delete(sessions::delete))
}
