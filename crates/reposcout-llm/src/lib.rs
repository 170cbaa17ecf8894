//! Embedding provider abstraction: token truncation, retry with randomized
//! exponential backoff, and an OpenAI-compatible HTTP backend.

pub mod embedder;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod tokenizer;

pub use embedder::Embedder;
pub use error::LlmError;
pub use provider::{EmbeddingInput, EmbeddingProvider};
pub use retry::RetryPolicy;
