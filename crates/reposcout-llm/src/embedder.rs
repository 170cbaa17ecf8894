//! Truncating, retrying front end over an [`EmbeddingProvider`].

use std::sync::Arc;

use crate::error::LlmError;
use crate::provider::{EmbeddingInput, EmbeddingProvider};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::tokenizer::Tokenizer;

pub struct Embedder<P: EmbeddingProvider> {
    provider: Arc<P>,
    tokenizer: Arc<dyn Tokenizer>,
    max_tokens: usize,
    retry: RetryPolicy,
}

impl<P: EmbeddingProvider> std::fmt::Debug for Embedder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<P: EmbeddingProvider> Embedder<P> {
    /// The token limit is the smaller of `max_tokens` and the provider's own limit.
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        tokenizer: Arc<dyn Tokenizer>,
        max_tokens: usize,
        retry: RetryPolicy,
    ) -> Self {
        let max_tokens = max_tokens.min(provider.context_limit());
        Self {
            provider,
            tokenizer,
            max_tokens,
            retry,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Token ids actually submitted for `text`.
    #[must_use]
    pub fn prepare(&self, text: &str) -> EmbeddingInput {
        EmbeddingInput(self.tokenizer.truncate(text, self.max_tokens))
    }

    /// Embed document text, truncated to the token limit.
    ///
    /// # Errors
    ///
    /// Returns the provider error once retries are exhausted, or immediately
    /// for permanent failures such as an invalid request.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let input = self.prepare(text);
        retry_with_backoff(&self.retry, self.provider.name(), || {
            self.provider.embed(&input)
        })
        .await
    }

    /// Embed a search query. Queries go through the same truncation path.
    ///
    /// # Errors
    ///
    /// Same as [`Embedder::embed`].
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LlmError> {
        self.embed(query).await
    }
}
