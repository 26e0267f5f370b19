#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Image could not be decoded: {0}")]
    Decode(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model timed out: {0}")]
    ModelTimeout(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Shorthand for an unknown or expired session.
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            entity: "Session",
            id: id.to_string(),
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    ///
    /// Only model-side failures qualify; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ModelUnavailable(_) | CoreError::ModelTimeout(_)
        )
    }
}
