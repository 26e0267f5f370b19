//! Exercises [`ChatCompletionsClient`] against an in-process axum server
//! that mimics the OpenAI-compatible API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use drawlens_vision::{ChatCompletionsClient, ModelConfig, ModelError, SamplingParams, VisionModel};

const PNG_MAGIC: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
}

/// Behaviour of the fake endpoint.
#[derive(Clone)]
enum Reply {
    Completion(&'static str),
    Status(StatusCode),
    Slow(Duration),
    NoChoices,
}

async fn spawn_server(reply: Reply, captured: Captured) -> String {
    let handler = move |State(captured): State<Captured>,
                        headers: HeaderMap,
                        Json(body): Json<Value>| {
        let reply = reply.clone();
        async move {
            *captured.body.lock().unwrap() = Some(body);
            *captured.auth.lock().unwrap() = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            match reply {
                Reply::Completion(text) => (
                    StatusCode::OK,
                    Json(json!({
                        "choices": [{
                            "index": 0,
                            "message": {"role": "assistant", "content": text}
                        }]
                    })),
                ),
                Reply::Status(status) => (status, Json(json!({"error": "boom"}))),
                Reply::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    (StatusCode::OK, Json(json!({"choices": []})))
                }
                Reply::NoChoices => (StatusCode::OK, Json(json!({"choices": []}))),
            }
        }
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(handler))
        .route("/v1/models", get(|| async { Json(json!({"data": []})) }))
        .with_state(captured);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: String, timeout_secs: u64) -> ModelConfig {
    ModelConfig {
        base_url,
        model_name: "test-model".to_string(),
        api_key: Some("token-123".to_string()),
        timeout_secs,
        sampling: SamplingParams::default(),
    }
}

// ---------------------------------------------------------------------------
// Test: successful completion and request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn returns_completion_and_sends_expected_request() {
    let captured = Captured::default();
    let base = spawn_server(Reply::Completion("The scale is 1:2."), captured.clone()).await;
    let client = ChatCompletionsClient::new(config(base, 10)).unwrap();

    let answer = client
        .invoke("<image>\nWhat is the scale?", &PNG_MAGIC, &SamplingParams::default())
        .await
        .unwrap();
    assert_eq!(answer, "The scale is 1:2.");

    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["max_tokens"], 4096);
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("technical drawing analyst"));

    let user = &body["messages"][1]["content"];
    assert_eq!(user[0]["type"], "image_url");
    assert!(user[0]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(user[1]["text"], "What is the scale?");

    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer token-123")
    );
}

// ---------------------------------------------------------------------------
// Test: failure mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_error_is_unavailable() {
    let base = spawn_server(
        Reply::Status(StatusCode::SERVICE_UNAVAILABLE),
        Captured::default(),
    )
    .await;
    let client = ChatCompletionsClient::new(config(base, 10)).unwrap();

    let err = client
        .invoke("<image>\nq", &PNG_MAGIC, &SamplingParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Unavailable(ref msg) if msg.contains("503"));
}

#[tokio::test]
async fn empty_choices_is_unavailable() {
    let base = spawn_server(Reply::NoChoices, Captured::default()).await;
    let client = ChatCompletionsClient::new(config(base, 10)).unwrap();

    let err = client
        .invoke("<image>\nq", &PNG_MAGIC, &SamplingParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Unavailable(_));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let base = spawn_server(Reply::Slow(Duration::from_secs(5)), Captured::default()).await;
    let client = ChatCompletionsClient::new(config(base, 1)).unwrap();

    let err = client
        .invoke("<image>\nq", &PNG_MAGIC, &SamplingParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Timeout(_));
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatCompletionsClient::new(config(format!("http://{addr}"), 5)).unwrap();
    let err = client
        .invoke("<image>\nq", &PNG_MAGIC, &SamplingParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, ModelError::Unavailable(_));
    assert!(!client.is_ready().await);
}

// ---------------------------------------------------------------------------
// Test: readiness probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ready_when_models_endpoint_answers() {
    let base = spawn_server(Reply::NoChoices, Captured::default()).await;
    let client = ChatCompletionsClient::new(config(base, 10)).unwrap();
    assert!(client.is_ready().await);
}
