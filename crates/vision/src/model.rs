use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Decoding parameters for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    /// Low temperature keeps answers close to what is on the drawing.
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 4096,
        }
    }
}

/// A vision-language model: image plus prompt in, text completion out.
///
/// `prompt` contains the `<image>` placeholder marking where the image is
/// attached. Implementations never retry.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        image: &[u8],
        sampling: &SamplingParams,
    ) -> Result<String, ModelError>;

    /// Cheap readiness probe used by health checks.
    async fn is_ready(&self) -> bool {
        true
    }
}
