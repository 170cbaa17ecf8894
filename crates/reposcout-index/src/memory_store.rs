//! Process-local collection. Nothing survives the process.

use std::sync::RwLock;

use indexmap::IndexMap;

use crate::error::{IndexError, Result};
use crate::store::{
    BoxFuture, EntryMetadata, IndexEntry, ScoredEntry, StoredEntry, VectorIndex,
    cosine_similarity, top_k,
};

struct StoredPoint {
    embedding: Vec<f32>,
    document: String,
    metadata: EntryMetadata,
}

pub struct MemoryIndex {
    collection: String,
    points: RwLock<IndexMap<String, StoredPoint>>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            points: RwLock::new(IndexMap::new()),
        }
    }
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

fn poisoned(e: impl std::fmt::Display) -> IndexError {
    IndexError::Storage(format!("memory index lock poisoned: {e}"))
}

impl VectorIndex for MemoryIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredEntry>>> {
        let id = id.to_owned();
        Box::pin(async move {
            let points = self.points.read().map_err(poisoned)?;
            Ok(points.get(&id).map(|p| StoredEntry {
                id: id.clone(),
                document: p.document.clone(),
                metadata: p.metadata.clone(),
            }))
        })
    }

    fn add(&self, entry: IndexEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut points = self.points.write().map_err(poisoned)?;
            points.insert(
                entry.id,
                StoredPoint {
                    embedding: entry.embedding,
                    document: entry.document,
                    metadata: entry.metadata,
                },
            );
            Ok(())
        })
    }

    fn query(&self, embedding: Vec<f32>, k: usize) -> BoxFuture<'_, Result<Vec<ScoredEntry>>> {
        Box::pin(async move {
            let points = self.points.read().map_err(poisoned)?;
            let hits = points
                .iter()
                .map(|(id, p)| ScoredEntry {
                    id: id.clone(),
                    score: cosine_similarity(&embedding, &p.embedding),
                    document: p.document.clone(),
                    metadata: p.metadata.clone(),
                })
                .collect();
            Ok(top_k(hits, k))
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move { Ok(self.points.read().map_err(poisoned)?.len()) })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
