//! Semantic search over one repository collection.

use std::sync::Arc;

use reposcout_llm::{Embedder, EmbeddingProvider};

use crate::error::Result;
use crate::store::{ScoredEntry, VectorIndex};

/// Number of results when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 3;

/// Embeds queries and joins the amalgamations of the nearest chunks.
pub struct RepoSearcher<P: EmbeddingProvider> {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<Embedder<P>>,
}

impl<P: EmbeddingProvider> RepoSearcher<P> {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<Embedder<P>>) -> Self {
        Self { index, embedder }
    }

    /// Nearest entries for `query`, at most `min(k, collection size)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the index fails.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>> {
        let size = self.index.count().await?;
        let k = k.min(size);
        if k == 0 {
            tracing::debug!(collection = self.index.collection(), "empty collection, nothing to search");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_query(query).await?;
        let hits = self.index.query(embedding, k).await?;
        tracing::debug!(
            collection = self.index.collection(),
            requested = k,
            returned = hits.len(),
            "search completed"
        );
        Ok(hits)
    }

    /// Amalgamations of the nearest chunks, newline-joined, most similar first.
    ///
    /// # Errors
    ///
    /// Same as [`RepoSearcher::retrieve`].
    pub async fn search(&self, query: &str, k: usize) -> Result<String> {
        let hits = self.retrieve(query, k).await?;
        Ok(join_amalgamations(&hits))
    }
}

fn join_amalgamations(hits: &[ScoredEntry]) -> String {
    hits.iter()
        .map(|h| h.metadata.amalgamation.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use reposcout_llm::mock::MockEmbeddingProvider;
    use reposcout_llm::tokenizer::Cl100kTokenizer;
    use reposcout_llm::RetryPolicy;

    use super::*;
    use crate::memory_store::MemoryIndex;
    use crate::store::{EntryMetadata, IndexEntry};

    fn embedder(provider: &Arc<MockEmbeddingProvider>) -> Arc<Embedder<MockEmbeddingProvider>> {
        Arc::new(Embedder::new(
            Arc::clone(provider),
            Arc::new(Cl100kTokenizer::new().unwrap()),
            8191,
            RetryPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn empty_collection_returns_empty_string_without_embedding() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let searcher = RepoSearcher::new(Arc::new(MemoryIndex::new("demo")), embedder(&provider));

        assert_eq!(searcher.search("main", DEFAULT_TOP_K).await.unwrap(), "");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn results_joined_by_newline_and_clamped() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let index = Arc::new(MemoryIndex::new("demo"));
        for (id, vector) in [("a", vec![1.0; 16]), ("b", vec![0.5; 16])] {
            index
                .add(IndexEntry {
                    id: id.into(),
                    embedding: vector,
                    document: String::new(),
                    metadata: EntryMetadata {
                        amalgamation: format!("##{id}"),
                    },
                })
                .await
                .unwrap();
        }
        let searcher = RepoSearcher::new(index, embedder(&provider));

        let hits = searcher.retrieve("anything", 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        let text = searcher.search("anything", 10).await.unwrap();
        let mut lines: Vec<_> = text.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["##a", "##b"]);
    }
}
