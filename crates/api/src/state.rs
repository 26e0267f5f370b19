use std::sync::Arc;

use drawlens_pipeline::DrawingService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the service is a bundle of `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub service: DrawingService,
    pub config: Arc<ServerConfig>,
}
