#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use tower::ServiceExt;

use drawlens_api::app;
use drawlens_api::config::ServerConfig;
use drawlens_api::state::AppState;
use drawlens_pipeline::SessionConfig;
use drawlens_vision::{ModelConfig, ModelError, SamplingParams, VisionModel};

pub const BOUNDARY: &str = "drawlens-test-boundary";

/// Canned model behaviour for HTTP tests.
pub enum FakeReply {
    Text(&'static str),
    Unavailable,
    Timeout,
}

/// In-process model stand-in that counts invocations.
pub struct FakeModel {
    reply: FakeReply,
    ready: bool,
    calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(reply: FakeReply) -> Self {
        Self {
            reply,
            ready: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    async fn invoke(
        &self,
        _prompt: &str,
        _image: &[u8],
        _sampling: &SamplingParams,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            FakeReply::Text(text) => Ok(text.to_string()),
            FakeReply::Unavailable => Err(ModelError::Unavailable("connection refused".into())),
            FakeReply::Timeout => Err(ModelError::Timeout("no answer after 120s".into())),
        }
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Build a test `ServerConfig` with safe defaults and background detection off.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        model: ModelConfig::from_lookup(|_| None),
        session: SessionConfig {
            ttl_hours: 24,
            sweep_interval_secs: 300,
            background_detection: false,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub model: Arc<FakeModel>,
}

/// Build the full application router around `model`, with the same
/// middleware stack production uses.
pub fn build_test_app(model: FakeModel) -> TestApp {
    build_test_app_with(model, test_config())
}

pub fn build_test_app_with(model: FakeModel, config: ServerConfig) -> TestApp {
    let model = Arc::new(model);
    let state = app::build_state(config, model.clone());
    TestApp {
        router: app::build_router(state.clone()),
        state,
        model,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a multipart body with one file field named `field`.
pub async fn upload(app: &Router, field: &str, bytes: &[u8]) -> Response<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"drawing.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/sessions")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A blank PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Upload a 400×300 PNG and return the new session id.
pub async fn create_session(app: &Router) -> String {
    let response = upload(app, "file", &png_bytes(400, 300)).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["session_id"]
        .as_str()
        .unwrap()
        .to_string()
}
