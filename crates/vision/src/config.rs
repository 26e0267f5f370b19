use std::time::Duration;

use crate::model::SamplingParams;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_MODEL_NAME: &str = "Qwen/Qwen3-VL-8B-Thinking";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Inference endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible server, without `/v1`.
    pub base_url: String,
    pub model_name: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub sampling: SamplingParams,
}

impl ModelConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                      |
    /// |----------------------|------------------------------|
    /// | `MODEL_BASE_URL`     | `http://localhost:8000`      |
    /// | `MODEL_NAME`         | `Qwen/Qwen3-VL-8B-Thinking`  |
    /// | `MODEL_API_KEY`      | unset                        |
    /// | `MODEL_TIMEOUT_SECS` | `120`                        |
    /// | `MODEL_TEMPERATURE`  | `0.1`                        |
    /// | `MODEL_TOP_P`        | `0.9`                        |
    /// | `MODEL_MAX_TOKENS`   | `4096`                       |
    ///
    /// # Panics
    ///
    /// Panics if a numeric variable does not parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ModelConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SamplingParams::default();

        let base_url = lookup("MODEL_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let model_name = lookup("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.into());

        let api_key = lookup("MODEL_API_KEY").filter(|k| !k.trim().is_empty());

        let timeout_secs: u64 = lookup("MODEL_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("MODEL_TIMEOUT_SECS must be a valid u64");

        let temperature: f32 = lookup("MODEL_TEMPERATURE")
            .map(|v| v.parse().expect("MODEL_TEMPERATURE must be a number"))
            .unwrap_or(defaults.temperature);

        let top_p: f32 = lookup("MODEL_TOP_P")
            .map(|v| v.parse().expect("MODEL_TOP_P must be a number"))
            .unwrap_or(defaults.top_p);

        let max_tokens: u32 = lookup("MODEL_MAX_TOKENS")
            .map(|v| v.parse().expect("MODEL_MAX_TOKENS must be a valid u32"))
            .unwrap_or(defaults.max_tokens);

        Self {
            base_url,
            model_name,
            api_key,
            timeout_secs,
            sampling: SamplingParams {
                temperature,
                top_p,
                max_tokens,
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
