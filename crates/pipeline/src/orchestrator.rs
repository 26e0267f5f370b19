//! Turn orchestration: prompt → model → parse → assemble.
//!
//! A turn moves through `built → invoked → parsed → assembled`, or to
//! `failed` from any stage. The model call is the only suspension point;
//! parsing runs the grounding parser and the entity extractors concurrently
//! on blocking threads. A panicking extractor is logged and contributes an
//! empty result instead of failing the turn.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use drawlens_core::error::CoreError;
use drawlens_core::extract::{
    extract_dimensions, extract_metadata, extract_part_numbers, extract_tables, Dimension,
    DrawingMetadata, ExtractedTable, PartNumber, PartNumberOptions,
};
use drawlens_core::grounding::{self, DetectedElement};
use drawlens_core::prompt::{self, AnalysisMode};
use drawlens_core::types::SessionId;
use drawlens_vision::{SamplingParams, VisionModel};

use crate::session::Session;

/// Stage a turn has reached, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Built,
    Invoked,
    Parsed,
    Assembled,
    Failed,
}

impl TurnStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnStage::Built => "built",
            TurnStage::Invoked => "invoked",
            TurnStage::Parsed => "parsed",
            TurnStage::Assembled => "assembled",
            TurnStage::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Answer with reasoning and grounding markup removed.
    pub answer_text: String,
    /// Answer with reasoning removed, markup intact.
    pub answer_markdown: String,
    pub detected_elements: Vec<DetectedElement>,
    pub dimensions: Vec<Dimension>,
    pub part_numbers: Vec<PartNumber>,
    pub tables: Vec<ExtractedTable>,
    pub metadata: DrawingMetadata,
    /// Seconds from prompt construction to assembly.
    pub processing_time: f64,
    pub grounding_requested: bool,
}

/// The parsers a turn runs over the completion.
///
/// Plain function pointers so each can be moved onto a blocking thread.
#[derive(Clone, Copy)]
pub struct Extractors {
    pub grounding: fn(&str, u32, u32) -> Vec<DetectedElement>,
    pub dimensions: fn(&str) -> Vec<Dimension>,
    pub part_numbers: fn(&str, PartNumberOptions) -> Vec<PartNumber>,
    pub tables: fn(&str) -> Vec<ExtractedTable>,
    pub metadata: fn(&str) -> DrawingMetadata,
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            grounding: grounding::parse,
            dimensions: extract_dimensions,
            part_numbers: extract_part_numbers,
            tables: extract_tables,
            metadata: extract_metadata,
        }
    }
}

pub struct TurnOrchestrator {
    model: Arc<dyn VisionModel>,
    sampling: SamplingParams,
    extractors: Extractors,
}

impl TurnOrchestrator {
    pub fn new(model: Arc<dyn VisionModel>, sampling: SamplingParams) -> Self {
        Self {
            model,
            sampling,
            extractors: Extractors::default(),
        }
    }

    /// Replace the parser set.
    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    /// Readiness of the underlying model endpoint.
    pub async fn model_ready(&self) -> bool {
        self.model.is_ready().await
    }

    /// Run one turn against `session`'s image.
    ///
    /// Does not touch the session store; the caller records the turn.
    pub async fn run(
        &self,
        session: &Session,
        mode: &AnalysisMode,
        grounding_requested: bool,
    ) -> Result<TurnOutcome, CoreError> {
        let started = Instant::now();
        let session_id = session.id;

        let prompt = prompt::build(mode, grounding_requested);
        tracing::debug!(
            %session_id,
            stage = %TurnStage::Built,
            mode = %mode,
            grounding = grounding_requested,
            "Turn prompt built"
        );

        let completion = match self
            .model
            .invoke(&prompt, &session.image, &self.sampling)
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                tracing::debug!(
                    %session_id,
                    stage = %TurnStage::Failed,
                    error = %e,
                    "Model invocation failed"
                );
                return Err(e.into());
            }
        };
        tracing::debug!(
            %session_id,
            stage = %TurnStage::Invoked,
            completion_chars = completion.len(),
            "Model answered"
        );

        let answer_markdown = grounding::strip_reasoning(&completion);
        let answer_text = grounding::strip_grounding(&completion);
        let parsed = self
            .parse(
                &answer_markdown,
                &answer_text,
                session,
                mode,
                grounding_requested,
            )
            .await;
        tracing::debug!(
            %session_id,
            stage = %TurnStage::Parsed,
            elements = parsed.detected_elements.len(),
            dimensions = parsed.dimensions.len(),
            part_numbers = parsed.part_numbers.len(),
            tables = parsed.tables.len(),
            "Completion parsed"
        );

        let processing_time = started.elapsed().as_secs_f64();
        tracing::debug!(
            %session_id,
            stage = %TurnStage::Assembled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn assembled"
        );

        Ok(TurnOutcome {
            answer_text,
            answer_markdown,
            detected_elements: parsed.detected_elements,
            dimensions: parsed.dimensions,
            part_numbers: parsed.part_numbers,
            tables: parsed.tables,
            metadata: parsed.metadata,
            processing_time,
            grounding_requested,
        })
    }

    async fn parse(
        &self,
        answer_markdown: &str,
        answer_text: &str,
        session: &Session,
        mode: &AnalysisMode,
        grounding_requested: bool,
    ) -> Parsed {
        let markdown: Arc<str> = Arc::from(answer_markdown);
        let text: Arc<str> = Arc::from(answer_text);
        let extractors = self.extractors;
        let frame = session.frame;
        let options = PartNumberOptions {
            include_designators: mode.wants_designators(),
        };

        let boxes = grounding_requested.then(|| {
            let markdown = Arc::clone(&markdown);
            tokio::task::spawn_blocking(move || {
                (extractors.grounding)(&markdown, frame.width, frame.height)
            })
        });
        let dimensions = {
            let text = Arc::clone(&text);
            tokio::task::spawn_blocking(move || (extractors.dimensions)(&text))
        };
        let part_numbers = {
            let text = Arc::clone(&text);
            tokio::task::spawn_blocking(move || (extractors.part_numbers)(&text, options))
        };
        let tables = {
            let markdown = Arc::clone(&markdown);
            tokio::task::spawn_blocking(move || (extractors.tables)(&markdown))
        };
        let metadata = tokio::task::spawn_blocking(move || (extractors.metadata)(&text));

        let (detected_elements, dimensions, part_numbers, tables, metadata) = tokio::join!(
            async {
                match boxes {
                    Some(handle) => settle(session.id, "grounding", handle).await,
                    None => Vec::new(),
                }
            },
            settle(session.id, "dimensions", dimensions),
            settle(session.id, "part_numbers", part_numbers),
            settle(session.id, "tables", tables),
            settle(session.id, "metadata", metadata),
        );

        Parsed {
            detected_elements,
            dimensions,
            part_numbers,
            tables,
            metadata,
        }
    }
}

struct Parsed {
    detected_elements: Vec<DetectedElement>,
    dimensions: Vec<Dimension>,
    part_numbers: Vec<PartNumber>,
    tables: Vec<ExtractedTable>,
    metadata: DrawingMetadata,
}

/// Await a parser task, degrading to an empty result if it panicked.
async fn settle<T: Default>(
    session_id: SessionId,
    extractor: &'static str,
    handle: JoinHandle<T>,
) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%session_id, extractor, error = %e, "parse degraded");
            T::default()
        }
    }
}
