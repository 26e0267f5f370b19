#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use image::{DynamicImage, ImageFormat, RgbImage};
use tokio::sync::Notify;

use drawlens_core::clock::ManualClock;
use drawlens_core::decoder::HeaderProbe;
use drawlens_pipeline::{DrawingService, SessionConfig, SessionStore, TurnOrchestrator};
use drawlens_vision::{ModelError, SamplingParams, VisionModel};

pub const IMAGE_WIDTH: u32 = 200;
pub const IMAGE_HEIGHT: u32 = 100;

/// Marker text of the view-detection instruction.
pub const VIEW_DETECTION_MARKER: &str = "Identify every view";

/// Encode a blank RGB image as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn drawing() -> Vec<u8> {
    png_bytes(IMAGE_WIDTH, IMAGE_HEIGHT)
}

type Responder = Box<dyn Fn(&str) -> Result<String, ModelError> + Send + Sync>;

/// Holds a call inside the model until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-process [`VisionModel`] that answers from a closure and records calls.
pub struct ScriptedModel {
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedModel {
    pub fn new(
        responder: impl Fn(&str) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Always answer with `text`.
    pub fn replying(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ModelError::Unavailable("connection refused".into())))
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn invoke(
        &self,
        prompt: &str,
        _image: &[u8],
        _sampling: &SamplingParams,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        (self.responder)(prompt)
    }
}

pub struct Harness {
    pub service: DrawingService,
    pub model: Arc<ScriptedModel>,
    pub clock: Arc<ManualClock>,
}

pub fn session_config(background_detection: bool) -> SessionConfig {
    SessionConfig {
        ttl_hours: 24,
        sweep_interval_secs: 300,
        background_detection,
    }
}

/// Wire a service around `model` with the real decoder and a manual clock.
pub fn harness(model: ScriptedModel, background_detection: bool) -> Harness {
    harness_with(model, background_detection, |orchestrator| orchestrator)
}

pub fn harness_with(
    model: ScriptedModel,
    background_detection: bool,
    customize: impl FnOnce(TurnOrchestrator) -> TurnOrchestrator,
) -> Harness {
    let model = Arc::new(model);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    ));
    let config = session_config(background_detection);
    let store = Arc::new(SessionStore::new(
        Arc::new(HeaderProbe),
        clock.clone(),
        config.ttl(),
    ));
    let orchestrator = customize(TurnOrchestrator::new(
        model.clone(),
        SamplingParams::default(),
    ));
    Harness {
        service: DrawingService::new(store, Arc::new(orchestrator), config),
        model,
        clock,
    }
}
