//! Vision-language model invocation.
//!
//! [`VisionModel`] is the seam the pipeline talks to; [`client::ChatCompletionsClient`]
//! implements it over an OpenAI-compatible `/v1/chat/completions` endpoint
//! (the API served by vLLM).

pub mod client;
pub mod config;
pub mod error;
pub mod model;

pub use client::ChatCompletionsClient;
pub use config::ModelConfig;
pub use error::ModelError;
pub use model::{SamplingParams, VisionModel};
