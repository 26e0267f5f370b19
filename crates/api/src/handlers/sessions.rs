//! Handlers for the `/sessions` resource: upload, chat turn, background
//! detection status and delete.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use drawlens_pipeline::{ChatTurnRequest, ChatTurnResponse, DetectionStatusResponse, UploadResponse};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/sessions
///
/// Multipart upload with the drawing in the `file` field. The image must
/// already be rasterized (PNG, JPEG or WebP); anything else is rejected with
/// 422 and no session is created.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadResponse>>)> {
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            file = Some(field.bytes().await?.to_vec());
        }
    }

    let data = file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let upload = state.service.upload(data).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: upload })))
}

/// POST /api/v1/sessions/{id}/chat
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatTurnRequest>,
) -> AppResult<Json<DataResponse<ChatTurnResponse>>> {
    let response = state.service.chat(&id, request).await?;
    Ok(Json(DataResponse { data: response }))
}

/// GET /api/v1/sessions/{id}/detection
///
/// Polled by clients after upload; does not extend the session's lifetime.
pub async fn detection_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<DetectionStatusResponse>>> {
    let status = state.service.detection_status(&id).await?;
    Ok(Json(DataResponse { data: status }))
}

/// DELETE /api/v1/sessions/{id}
///
/// Idempotent: unknown ids also return 204.
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.service.delete(&id).await;
    StatusCode::NO_CONTENT
}
