use std::future::Future;

use serde::Serialize;

use crate::error::LlmError;

/// Payload submitted to an embedding provider.
///
/// Truncated text is sent as token ids so the provider sees exactly the
/// tokens that were counted against its context limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmbeddingInput(pub Vec<usize>);

impl EmbeddingInput {
    #[must_use]
    pub fn tokens(&self) -> &[usize] {
        &self.0
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.0.len()
    }
}

pub trait EmbeddingProvider: Send + Sync {
    /// Convert one input into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or rejects the input.
    fn embed(
        &self,
        input: &EmbeddingInput,
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;

    /// Maximum number of input tokens the provider accepts per call.
    fn context_limit(&self) -> usize;
}
