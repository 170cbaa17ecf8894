//! Error types for reposcout-index.

/// Errors that can occur during indexing and search.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `SQLite` database error.
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Qdrant vector store error.
    #[cfg(feature = "qdrant")]
    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(#[from] reposcout_llm::LlmError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source could not be parsed.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Unsupported or unrecognized language.
    #[error("unsupported language")]
    UnsupportedLanguage,

    /// The vector index could not be written or flushed.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// Embedding a chunk failed after all retries.
    #[error("chunk {chunk_id} failed: {source}")]
    ChunkFailed {
        chunk_id: String,
        #[source]
        source: reposcout_llm::LlmError,
    },

    /// The run was stopped by a shutdown signal.
    #[error("indexing cancelled")]
    Cancelled,
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
