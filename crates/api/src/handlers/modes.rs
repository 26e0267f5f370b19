use axum::Json;
use drawlens_core::prompt::{self, ModeInfo};

use crate::response::DataResponse;

/// GET /api/v1/modes
///
/// Catalog of analysis modes accepted by the chat endpoint.
pub async fn list_modes() -> Json<DataResponse<Vec<ModeInfo>>> {
    Json(DataResponse {
        data: prompt::modes(),
    })
}
