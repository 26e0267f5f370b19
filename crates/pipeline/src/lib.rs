//! Session and turn pipeline.
//!
//! Owns the in-memory session store, runs chat turns against a
//! [`VisionModel`](drawlens_vision::VisionModel), and drives the background
//! jobs (per-session view detection, periodic expiry sweep).

pub mod background;
pub mod config;
pub mod orchestrator;
pub mod service;
pub mod session;

pub use config::SessionConfig;
pub use orchestrator::{Extractors, TurnOrchestrator, TurnOutcome, TurnStage};
pub use service::{
    ChatTurnRequest, ChatTurnResponse, DetectionStatusResponse, DrawingService, UploadResponse,
};
pub use session::{
    BackgroundDetection, DetectionPublisher, DetectionState, Session, SessionStatus, SessionStore,
};
