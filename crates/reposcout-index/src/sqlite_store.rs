//! Durable single-file `SQLite` collection with brute-force cosine search.

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::{
    BoxFuture, EntryMetadata, IndexEntry, ScoredEntry, StoredEntry, VectorIndex,
    cosine_similarity, top_k,
};

/// One repository collection backed by `SQLite`.
#[derive(Debug)]
pub struct SqliteIndex {
    collection: String,
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteIndex {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// cannot be opened, or migrations fail.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        Self::with_pool(pool, collection).await
    }

    #[cfg(test)]
    pub(crate) async fn open_in_memory(collection: &str) -> Result<Self> {
        // every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool, collection).await
    }

    async fn with_pool(pool: SqlitePool, collection: &str) -> Result<Self> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self {
            collection: collection.to_string(),
            pool,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl VectorIndex for SqliteIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredEntry>>> {
        let id = id.to_owned();
        Box::pin(async move {
            let row: Option<(String, String, String)> =
                sqlx::query_as("SELECT id, document, metadata FROM index_entries WHERE id = ?")
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await?;

            let Some((id, document, metadata)) = row else {
                return Ok(None);
            };
            Ok(Some(StoredEntry {
                id,
                document,
                metadata: serde_json::from_str(&metadata)?,
            }))
        })
    }

    fn add(&self, entry: IndexEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let metadata = serde_json::to_string(&entry.metadata)?;
            let _guard = self.write_lock.lock().await;
            sqlx::query(
                "INSERT INTO index_entries (id, embedding, document, metadata) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(encode_embedding(&entry.embedding))
            .bind(&entry.document)
            .bind(metadata)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn query(&self, embedding: Vec<f32>, k: usize) -> BoxFuture<'_, Result<Vec<ScoredEntry>>> {
        Box::pin(async move {
            if k == 0 {
                return Ok(Vec::new());
            }
            let rows: Vec<(String, Vec<u8>, String, String)> = sqlx::query_as(
                "SELECT id, embedding, document, metadata FROM index_entries ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?;

            let mut hits = Vec::with_capacity(rows.len());
            for (id, blob, document, metadata) in rows {
                let metadata: EntryMetadata = serde_json::from_str(&metadata)?;
                hits.push(ScoredEntry {
                    id,
                    score: cosine_similarity(&embedding, &decode_embedding(&blob)),
                    document,
                    metadata,
                });
            }
            Ok(top_k(hits, k))
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move {
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM index_entries")
                .fetch_one(&self.pool)
                .await?;
            Ok(usize::try_from(n).unwrap_or(0))
        })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&self.pool)
                .await?;
            tracing::debug!(collection = %self.collection, "collection persisted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            embedding,
            document: format!("code of {id}"),
            metadata: EntryMetadata {
                amalgamation: format!("##{id}"),
            },
        }
    }

    #[test]
    fn embedding_blob_round_trip() {
        let v = vec![0.5_f32, -1.25, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
    }

    #[tokio::test]
    async fn get_missing_then_present() {
        let index = SqliteIndex::open_in_memory("demo").await.unwrap();
        assert!(index.get("a.py").await.unwrap().is_none());

        index.add(entry("a.py", vec![1.0, 0.0])).await.unwrap();
        let stored = index.get("a.py").await.unwrap().unwrap();
        assert_eq!(stored.document, "code of a.py");
        assert_eq!(stored.metadata.amalgamation, "##a.py");
    }

    #[tokio::test]
    async fn query_clamps_to_collection_size() {
        let index = SqliteIndex::open_in_memory("demo").await.unwrap();
        index.add(entry("a", vec![1.0, 0.0])).await.unwrap();
        index.add(entry("b", vec![0.0, 1.0])).await.unwrap();

        let hits = index.query(vec![1.0, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn query_empty_collection() {
        let index = SqliteIndex::open_in_memory("demo").await.unwrap();
        assert!(index.query(vec![1.0], 3).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings-demo").join("index.db");
        {
            let index = SqliteIndex::open(&path, "demo").await.unwrap();
            index.add(entry("a", vec![1.0, 2.0])).await.unwrap();
            index.persist().await.unwrap();
            index.pool().close().await;
        }
        let reopened = SqliteIndex::open(&path, "demo").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.get("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteIndex::open(&dir.path().join("index.db"), "demo")
            .await
            .unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(index.pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
