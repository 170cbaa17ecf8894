use std::path::PathBuf;
use std::time::Duration;

use reposcout_index::chunker::{ChunkIdScheme, DEFAULT_CHUNK_SIZE};
use reposcout_index::indexer::{FailurePolicy, IndexerConfig};
use reposcout_index::retriever::DEFAULT_TOP_K;
use reposcout_index::store::{IndexBackend, StoreOptions};
use reposcout_llm::RetryPolicy;
use reposcout_llm::openai::DEFAULT_CONTEXT_LIMIT;
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Any OpenAI-compatible `/embeddings` endpoint.
    #[default]
    OpenAi,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

fn default_max_input_tokens() -> usize {
    DEFAULT_CONTEXT_LIMIT
}

fn default_embedding_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: default_base_url(),
            model: default_embedding_model(),
            max_input_tokens: default_max_input_tokens(),
            timeout_secs: default_embedding_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    6
}

fn default_min_wait_ms() -> u64 {
    1_000
}

fn default_max_wait_ms() -> u64 {
    20_000
}

fn default_max_elapsed_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// 0 disables the wall-clock cap.
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            max_elapsed_secs: default_max_elapsed_secs(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            min_wait: Duration::from_millis(self.min_wait_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            max_elapsed: (self.max_elapsed_secs > 0)
                .then(|| Duration::from_secs(self.max_elapsed_secs)),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_repo_cache_dir() -> PathBuf {
    PathBuf::from(".cache/repo")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_embed_concurrency() -> usize {
    1
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Root of the working copies, one directory per repository name.
    #[serde(default = "default_repo_cache_dir")]
    pub repo_cache_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_ids: ChunkIdScheme,
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
    #[serde(default)]
    pub on_chunk_failure: FailurePolicy,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            cache_dir: default_cache_dir(),
            repo_cache_dir: default_repo_cache_dir(),
            chunk_size: default_chunk_size(),
            chunk_ids: ChunkIdScheme::default(),
            embed_concurrency: default_embed_concurrency(),
            on_chunk_failure: FailurePolicy::default(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunk_size: self.chunk_size,
            id_scheme: self.chunk_ids,
            embed_concurrency: self.embed_concurrency,
            on_failure: self.on_chunk_failure,
        }
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            backend: self.backend,
            cache_dir: self.cache_dir.clone(),
            qdrant_url: self.qdrant_url.clone(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_entrypoint_query() -> String {
    "main".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Query run after loading a repository to surface its entry points.
    #[serde(default = "default_entrypoint_query")]
    pub entrypoint_query: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            entrypoint_query: default_entrypoint_query(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
}
