pub mod health;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sessions                       upload
/// /sessions/{id}/chat             chat turn
/// /sessions/{id}/detection        background detection status
/// /sessions/{id}                  delete
/// /modes                          analysis mode catalog
/// ```
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/sessions", sessions::router(max_upload_bytes))
        .route("/modes", get(handlers::modes::list_modes))
}
