use std::path::PathBuf;

use super::Config;
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REPOSCOUT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOSCOUT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOSCOUT_CACHE_DIR") {
            self.index.cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("REPOSCOUT_REPO_CACHE_DIR") {
            self.index.repo_cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("REPOSCOUT_INDEX_BACKEND") {
            if let Ok(backend) = v.parse() {
                self.index.backend = backend;
            } else {
                tracing::warn!("ignoring invalid REPOSCOUT_INDEX_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOSCOUT_CHUNK_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                self.index.chunk_size = size;
            } else {
                tracing::warn!("ignoring invalid REPOSCOUT_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOSCOUT_EMBED_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                self.index.embed_concurrency = n;
            } else {
                tracing::warn!("ignoring invalid REPOSCOUT_EMBED_CONCURRENCY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOSCOUT_TOP_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.search.top_k = k;
            } else {
                tracing::warn!("ignoring invalid REPOSCOUT_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOSCOUT_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
    }

    /// Pick up the embedding API key from the environment.
    pub(crate) fn resolve_secrets(&mut self) {
        let key = std::env::var("REPOSCOUT_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());
        self.secrets.api_key = key.map(Secret::new);
    }
}
