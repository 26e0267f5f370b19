//! Service facade over the session store and the turn orchestrator.
//!
//! This is the surface the HTTP layer talks to: upload, chat turn,
//! detection status and delete. Session ids arrive as strings; a malformed
//! id is treated exactly like an unknown one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use drawlens_core::error::CoreError;
use drawlens_core::extract::{Dimension, DrawingMetadata, ExtractedTable, PartNumber};
use drawlens_core::grounding::DetectedElement;
use drawlens_core::prompt::{self, AnalysisMode};
use drawlens_core::types::SessionId;

use crate::background;
use crate::config::SessionConfig;
use crate::orchestrator::TurnOrchestrator;
use crate::session::{DetectionState, SessionStatus, SessionStore};

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub detection_status: DetectionState,
    pub image_width: u32,
    pub image_height: u32,
}

/// One chat turn. The session id comes from the request path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub question: String,
    /// Overrides the spatial-keyword heuristic when set.
    pub use_grounding: Option<bool>,
    /// Analysis mode id; free-form question when absent.
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnResponse {
    pub answer_text: String,
    pub answer_markdown: String,
    pub detected_elements: Vec<DetectedElement>,
    pub image_width: u32,
    pub image_height: u32,
    pub processing_time: f64,
    pub dimensions: Vec<Dimension>,
    pub part_numbers: Vec<PartNumber>,
    pub tables: Vec<ExtractedTable>,
    pub metadata: DrawingMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionStatusResponse {
    pub detection_status: DetectionState,
    pub elements: Vec<DetectedElement>,
    pub elements_count: usize,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DrawingService {
    store: Arc<SessionStore>,
    orchestrator: Arc<TurnOrchestrator>,
    config: SessionConfig,
}

impl DrawingService {
    pub fn new(
        store: Arc<SessionStore>,
        orchestrator: Arc<TurnOrchestrator>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session for `image` and, when enabled, start background
    /// view detection for it.
    pub async fn upload(&self, image: Vec<u8>) -> Result<UploadResponse, CoreError> {
        let bytes = image.len();
        let (session, publisher) = self.store.create(image).await.map_err(|e| {
            tracing::info!(bytes, error = %e, "Upload rejected");
            e
        })?;

        let detection_status = if self.config.background_detection {
            background::spawn_detection(
                Arc::clone(&self.orchestrator),
                Arc::clone(&self.store),
                session.clone(),
                publisher,
            );
            session.background_detection.state
        } else {
            publisher.disabled();
            DetectionState::Disabled
        };

        Ok(UploadResponse {
            session_id: session.id,
            status: session.status,
            detection_status,
            image_width: session.frame.width,
            image_height: session.frame.height,
        })
    }

    /// Run one question against a session.
    ///
    /// The request is validated and the session looked up before the model
    /// is called. If the session disappears while the model is working the
    /// answer is still returned; only the session update is dropped.
    pub async fn chat(
        &self,
        session_id: &str,
        request: ChatTurnRequest,
    ) -> Result<ChatTurnResponse, CoreError> {
        let mode = resolve_mode(&request)?;
        let grounding = request.use_grounding.unwrap_or_else(|| {
            mode == AnalysisMode::ViewDetection || prompt::wants_grounding(&request.question)
        });

        let id: SessionId = session_id.parse()?;
        let session = self.store.acquire(&id).await?;

        let outcome = self.orchestrator.run(&session, &mode, grounding).await?;

        let display = (!outcome.detected_elements.is_empty())
            .then(|| outcome.detected_elements.clone());
        if !self.store.record_turn(&id, display).await {
            tracing::debug!(session_id = %id, "Session removed during turn; update dropped");
        }

        tracing::info!(
            session_id = %id,
            mode = %mode,
            grounding,
            elements = outcome.detected_elements.len(),
            elapsed_ms = (outcome.processing_time * 1000.0) as u64,
            "Chat turn completed"
        );

        Ok(ChatTurnResponse {
            answer_text: outcome.answer_text,
            answer_markdown: outcome.answer_markdown,
            detected_elements: outcome.detected_elements,
            image_width: session.frame.width,
            image_height: session.frame.height,
            processing_time: outcome.processing_time,
            dimensions: outcome.dimensions,
            part_numbers: outcome.part_numbers,
            tables: outcome.tables,
            metadata: outcome.metadata,
        })
    }

    /// Current background-detection state. Does not refresh the session.
    pub async fn detection_status(
        &self,
        session_id: &str,
    ) -> Result<DetectionStatusResponse, CoreError> {
        let id: SessionId = session_id.parse()?;
        let detection = self.store.get(&id).await?.background_detection;
        Ok(DetectionStatusResponse {
            detection_status: detection.state,
            elements_count: detection.elements.len(),
            elements: detection.elements,
        })
    }

    /// Remove a session. Unknown and malformed ids are a no-op.
    pub async fn delete(&self, session_id: &str) -> bool {
        match session_id.parse::<SessionId>() {
            Ok(id) => self.store.delete(&id).await,
            Err(_) => false,
        }
    }

    pub async fn model_ready(&self) -> bool {
        self.orchestrator.model_ready().await
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }
}

/// Pick the analysis mode for a request and validate its question.
///
/// An explicit non-custom mode brings its own prompt, so the question may be
/// empty and is otherwise ignored.
fn resolve_mode(request: &ChatTurnRequest) -> Result<AnalysisMode, CoreError> {
    let question = request.question.as_str();
    match request.mode.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && id != "custom" => {
            prompt::validate_question(question, true)?;
            AnalysisMode::from_id(id, None)
        }
        _ => {
            prompt::validate_question(question, false)?;
            AnalysisMode::from_id("custom", Some(question))
        }
    }
}
