//! Per-repository vector index abstraction and backend selection.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::memory_store::MemoryIndex;
use crate::sqlite_store::SqliteIndex;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// File name of the `SQLite` database inside a collection directory.
pub const DATABASE_FILE: &str = "index.db";

/// Metadata blob stored alongside each embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub amalgamation: String,
}

/// One chunk as written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: EntryMetadata,
}

/// Entry as returned by [`VectorIndex::get`]; the embedding is not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
}

/// Query hit, ordered by descending `score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub document: String,
    pub metadata: EntryMetadata,
}

/// A single repository's collection.
///
/// `get`, `query` and `count` may run concurrently. `add` and `persist`
/// are serialized by each backend. Adding an id that already exists is
/// unsupported; callers check with `get` first.
pub trait VectorIndex: Send + Sync {
    fn collection(&self) -> &str;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredEntry>>>;

    fn add(&self, entry: IndexEntry) -> BoxFuture<'_, Result<()>>;

    /// Up to `k` nearest entries; `k` is clamped to the collection size.
    fn query(&self, embedding: Vec<f32>, k: usize) -> BoxFuture<'_, Result<Vec<ScoredEntry>>>;

    fn count(&self) -> BoxFuture<'_, Result<usize>>;

    /// Flush all prior `add` calls to stable storage.
    fn persist(&self) -> BoxFuture<'_, Result<()>>;
}

/// Storage backend for repository collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Sqlite,
    Memory,
    Qdrant,
}

impl std::str::FromStr for IndexBackend {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(IndexError::Storage(format!("unknown index backend: {other}"))),
        }
    }
}

/// Where collections live.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backend: IndexBackend,
    pub cache_dir: PathBuf,
    pub qdrant_url: String,
}

/// Replace characters outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_repo_name(repo_name: &str) -> String {
    repo_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory holding the collection for `repo_name`.
#[must_use]
pub fn collection_dir(cache_dir: &Path, repo_name: &str) -> PathBuf {
    cache_dir.join(format!("embeddings-{}", sanitize_repo_name(repo_name)))
}

/// Open (creating lazily) the collection for `repo_name`.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached or initialized.
pub async fn open_collection(
    options: &StoreOptions,
    repo_name: &str,
) -> Result<Arc<dyn VectorIndex>> {
    let collection = sanitize_repo_name(repo_name);
    match options.backend {
        IndexBackend::Sqlite => {
            let path = collection_dir(&options.cache_dir, repo_name).join(DATABASE_FILE);
            let index = SqliteIndex::open(&path, &collection).await?;
            Ok(Arc::new(index))
        }
        IndexBackend::Memory => Ok(Arc::new(MemoryIndex::new(collection))),
        #[cfg(feature = "qdrant")]
        IndexBackend::Qdrant => {
            let index = crate::qdrant_store::QdrantIndex::new(&options.qdrant_url, collection)?;
            Ok(Arc::new(index))
        }
        #[cfg(not(feature = "qdrant"))]
        IndexBackend::Qdrant => Err(IndexError::Storage(
            "qdrant backend requires the `qdrant` feature".into(),
        )),
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort by descending score and keep the first `k`.
pub(crate) fn top_k(mut hits: Vec<ScoredEntry>, k: usize) -> Vec<ScoredEntry> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_repo_name("owner/repo name"), "owner_repo_name");
        assert_eq!(sanitize_repo_name("my-repo_1.0"), "my-repo_1.0");
    }

    #[test]
    fn collection_dir_layout() {
        let dir = collection_dir(Path::new(".cache"), "demo");
        assert_eq!(dir, Path::new(".cache").join("embeddings-demo"));
    }

    #[test]
    fn backend_parses_case_insensitive() {
        assert_eq!("SQLite".parse::<IndexBackend>().unwrap(), IndexBackend::Sqlite);
        assert_eq!("memory".parse::<IndexBackend>().unwrap(), IndexBackend::Memory);
        assert!("chroma".parse::<IndexBackend>().is_err());
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn top_k_orders_and_truncates() {
        let hit = |id: &str, score: f32| ScoredEntry {
            id: id.into(),
            score,
            document: String::new(),
            metadata: EntryMetadata {
                amalgamation: id.into(),
            },
        };
        let hits = top_k(vec![hit("a", 0.1), hit("b", 0.9), hit("c", 0.5)], 2);
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn memory_backend_opens_without_disk() {
        let options = StoreOptions {
            backend: IndexBackend::Memory,
            cache_dir: PathBuf::from("/nonexistent"),
            qdrant_url: String::new(),
        };
        let index = open_collection(&options, "demo/repo").await.unwrap();
        assert_eq!(index.collection(), "demo_repo");
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sqlite_backend_creates_collection_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            backend: IndexBackend::Sqlite,
            cache_dir: dir.path().to_path_buf(),
            qdrant_url: String::new(),
        };
        let index = open_collection(&options, "demo").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(dir.path().join("embeddings-demo").join(DATABASE_FILE).exists());
    }
}
