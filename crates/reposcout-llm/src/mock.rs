//! Test-only mock embedding provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{EmbeddingInput, EmbeddingProvider};

/// Deterministic provider: the vector is a hashed bag of the input tokens,
/// so identical inputs embed identically and overlapping inputs score higher.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    context_limit: usize,
    failures: Arc<Mutex<VecDeque<LlmError>>>,
    inputs: Arc<Mutex<Vec<EmbeddingInput>>>,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            context_limit: crate::openai::DEFAULT_CONTEXT_LIMIT,
            failures: Arc::new(Mutex::new(VecDeque::new())),
            inputs: Arc::new(Mutex::new(Vec::new())),
            delay_ms: 0,
        }
    }

    /// Errors returned, in order, by the next calls before succeeding.
    #[must_use]
    pub fn with_failures(self, failures: Vec<LlmError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    #[must_use]
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Queue more failures on an already shared provider.
    pub fn push_failure(&self, err: LlmError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Number of `embed` calls made so far, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    #[must_use]
    pub fn inputs(&self) -> Vec<EmbeddingInput> {
        self.inputs.lock().unwrap().clone()
    }

    #[must_use]
    pub fn vector_for(&self, input: &EmbeddingInput) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for t in input.tokens() {
            vector[t % self.dimension] += 1.0;
        }
        vector
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, input: &EmbeddingInput) -> Result<Vec<f32>, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.inputs.lock().unwrap().push(input.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.vector_for(input))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    fn context_limit(&self) -> usize {
        self.context_limit
    }
}
