use drawlens_core::error::CoreError;

/// Failures talking to the inference endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Connection refused, non-2xx status, or an unusable response body.
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),

    /// No complete response within the configured timeout.
    #[error("model request timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(err.to_string())
        } else {
            ModelError::Unavailable(err.to_string())
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable(msg) => CoreError::ModelUnavailable(msg),
            ModelError::Timeout(msg) => CoreError::ModelTimeout(msg),
        }
    }
}
