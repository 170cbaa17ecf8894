use std::path::PathBuf;

use reposcout_index::IndexError;

/// Errors surfaced to the request layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A search was issued before any repository was loaded.
    #[error("no repository has been loaded yet, load a repository first")]
    NotLoaded,

    /// The working copy for a repository does not exist.
    #[error("repository not found at {}", .0.display())]
    MissingRepository(PathBuf),

    /// Neither `REPOSCOUT_API_KEY` nor `OPENAI_API_KEY` is set.
    #[error("embedding API key is not configured (set REPOSCOUT_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("embedding client setup failed: {0}")]
    Embedding(#[from] reposcout_llm::LlmError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
