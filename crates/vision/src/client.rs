//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! Each invocation is a single `POST {base_url}/v1/chat/completions` with a
//! system message and one user message whose content interleaves the prompt
//! text with the image as a base64 `data:` URL.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use drawlens_core::prompt::{IMAGE_PLACEHOLDER, SYSTEM_PROMPT};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::model::{SamplingParams, VisionModel};

/// Timeout for the readiness probe, independent of the invocation timeout.
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`VisionModel`] backed by a remote OpenAI-compatible server.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl ChatCompletionsClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ModelError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Encode image bytes as a `data:` URL, sniffing the MIME type.
pub fn data_url(image: &[u8]) -> String {
    let mime = image::guess_format(image)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{mime};base64,{}", BASE64.encode(image))
}

/// Split the prompt around the image placeholder into content parts.
///
/// Without a placeholder the image goes first.
fn user_parts<'a>(prompt: &'a str, image_url: String) -> Vec<ContentPart<'a>> {
    let (before, after) = prompt
        .split_once(IMAGE_PLACEHOLDER)
        .unwrap_or(("", prompt));
    let mut parts = Vec::with_capacity(3);
    if !before.trim().is_empty() {
        parts.push(ContentPart::Text {
            text: before.trim(),
        });
    }
    parts.push(ContentPart::ImageUrl {
        image_url: ImageUrl { url: image_url },
    });
    if !after.trim().is_empty() {
        parts.push(ContentPart::Text { text: after.trim() });
    }
    parts
}

#[async_trait]
impl VisionModel for ChatCompletionsClient {
    async fn invoke(
        &self,
        prompt: &str,
        image: &[u8],
        sampling: &SamplingParams,
    ) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: &self.config.model_name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(user_parts(prompt, data_url(image))),
                },
            ],
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            max_tokens: sampling.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model_name,
            image_bytes = image.len(),
            prompt_chars = prompt.len(),
            "Invoking vision model"
        );

        let response = self
            .authorize(self.client.post(self.completions_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ModelError::Unavailable(format!(
                "endpoint returned HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| match ModelError::from(e) {
                ModelError::Unavailable(msg) => {
                    ModelError::Unavailable(format!("malformed completion: {msg}"))
                }
                timeout => timeout,
            })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Unavailable("completion has no choices".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn is_ready(&self) -> bool {
        let request = self
            .authorize(self.client.get(format!("{}/v1/models", self.config.base_url)))
            .timeout(READY_PROBE_TIMEOUT);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Model readiness probe failed");
                false
            }
        }
    }
}
