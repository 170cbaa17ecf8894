#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("provider unavailable (status {status})")]
    Unavailable { status: u16 },

    /// Malformed or oversized request. Retrying the same input cannot succeed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication rejected by {provider}")]
    Auth { provider: String },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the failure is transient and the call may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_) | Self::Auth { .. } | Self::Tokenizer(_))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_is_permanent() {
        assert!(!LlmError::InvalidRequest("too long".into()).is_retryable());
        assert!(
            !LlmError::Auth {
                provider: "openai".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::Unavailable { status: 503 }.is_retryable());
        assert!(
            LlmError::EmptyResponse {
                provider: "openai".into()
            }
            .is_retryable()
        );
        assert!(LlmError::Other("connection reset".into()).is_retryable());
    }
}
