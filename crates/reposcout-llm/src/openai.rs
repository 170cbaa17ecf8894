use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbeddingInput, EmbeddingProvider};

/// Context limit of the `text-embedding-ada-002` / `text-embedding-3-*` family.
pub const DEFAULT_CONTEXT_LIMIT: usize = 8191;

/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    context_limit: usize,
}

impl fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("context_limit", &self.context_limit)
            .finish()
    }
}

impl OpenAiEmbeddings {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        mut base_url: String,
        model: String,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            api_key,
            base_url,
            model,
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, input: &EmbeddingInput) -> Result<Vec<f32>, LlmError> {
        let body = EmbeddingRequest {
            input,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenAI embedding API error {status}: {text}");
            return Err(classify_failure(status, &text));
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn context_limit(&self) -> usize {
        self.context_limit
    }
}

/// Map a non-success HTTP status onto the retry taxonomy.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("status {status}"));

    match status.as_u16() {
        429 => LlmError::RateLimited,
        401 | 403 => LlmError::Auth {
            provider: "openai".into(),
        },
        400 | 404 | 409 | 413 | 422 => LlmError::InvalidRequest(message),
        s if status.is_server_error() => LlmError::Unavailable { status: s },
        _ => LlmError::Other(format!("OpenAI embedding request failed: {message}")),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a EmbeddingInput,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
