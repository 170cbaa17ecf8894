//! Repository indexing orchestrator: discover → extract → chunk → embed → store.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use reposcout_llm::{Embedder, EmbeddingProvider, LlmError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::chunker::{Chunk, ChunkIdScheme, DEFAULT_CHUNK_SIZE, PreparedFile, chunk_files};
use crate::error::{IndexError, Result};
use crate::format::render_amalgamation;
use crate::source::{discover, read_source};
use crate::store::{EntryMetadata, IndexEntry, VectorIndex};

/// What to do with a chunk whose embedding failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Persist what was added and fail the run.
    #[default]
    Abort,
    /// Record the chunk as failed and continue with the next one.
    Skip,
}

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunk_size: usize,
    pub id_scheme: ChunkIdScheme,
    /// Embedding calls in flight at once.
    pub embed_concurrency: usize,
    pub on_failure: FailurePolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            id_scheme: ChunkIdScheme::default(),
            embed_concurrency: 1,
            on_failure: FailurePolicy::default(),
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_empty: usize,
    pub extraction_failures: usize,
    pub chunks_created: usize,
    pub chunks_skipped: usize,
    pub chunks_failed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

enum ChunkOutcome {
    Cancelled,
    Exists,
    Embedded(Vec<f32>),
    Failed(LlmError),
    Storage(IndexError),
}

/// Indexes one repository into one collection.
pub struct RepoIndexer<P: EmbeddingProvider> {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<Embedder<P>>,
    config: IndexerConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<P: EmbeddingProvider> RepoIndexer<P> {
    #[must_use]
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<Embedder<P>>, config: IndexerConfig) -> Self {
        Self {
            index,
            embedder,
            config,
            shutdown: None,
        }
    }

    /// Stop between chunks once the receiver observes `true`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Index every eligible file under `root`, skipping chunks already stored.
    ///
    /// Re-running on an unchanged tree makes no embedding calls.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] on shutdown,
    /// [`IndexError::ChunkFailed`] when a chunk cannot be embedded under the
    /// abort policy, or the storage error that failed a `get` or `add`.
    /// Everything added before the error is persisted.
    pub async fn index_repository(&self, repo_name: &str, root: &Path) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        let files = self.prepare_files(repo_name, root, &mut report).await;
        let chunks = chunk_files(&files, self.config.chunk_size, self.config.id_scheme);
        tracing::info!(
            repo = repo_name,
            files = files.len(),
            chunks = chunks.len(),
            "indexing started"
        );

        let total = chunks.len();
        // repeats of an id within one run count as already indexed
        let mut dispatched = HashSet::with_capacity(total);
        let chunks: Vec<(Chunk, bool)> = chunks
            .into_iter()
            .map(|chunk| {
                let repeat = !dispatched.insert(chunk.id.clone());
                (chunk, repeat)
            })
            .collect();

        let mut outcomes = futures::stream::iter(chunks)
            .map(move |(chunk, repeat)| async move {
                let outcome = if repeat {
                    ChunkOutcome::Exists
                } else {
                    self.process_chunk(&chunk).await
                };
                (chunk, outcome)
            })
            .buffered(self.config.embed_concurrency.max(1));

        let mut done = 0usize;
        while let Some((chunk, outcome)) = outcomes.next().await {
            done += 1;
            match outcome {
                ChunkOutcome::Cancelled => return self.stop(IndexError::Cancelled, &report).await,
                ChunkOutcome::Storage(err) => return self.stop(err, &report).await,
                ChunkOutcome::Exists => {
                    tracing::info!(chunk = %chunk.id, "chunk already indexed, skipping");
                    report.chunks_skipped += 1;
                }
                ChunkOutcome::Embedded(embedding) => {
                    if self.is_cancelled() {
                        return self.stop(IndexError::Cancelled, &report).await;
                    }
                    let files_in_chunk = chunk.file_names.len();
                    let chunk_id = chunk.id.clone();
                    if let Err(err) = self.index.add(to_entry(chunk, embedding)).await {
                        return self.stop(err, &report).await;
                    }
                    report.chunks_created += 1;
                    tracing::info!(
                        chunk = %chunk_id,
                        files = files_in_chunk,
                        progress = format_args!("{done}/{total}"),
                        "chunk embedded"
                    );
                }
                ChunkOutcome::Failed(source) => match self.config.on_failure {
                    FailurePolicy::Abort => {
                        let err = IndexError::ChunkFailed {
                            chunk_id: chunk.id,
                            source,
                        };
                        return self.stop(err, &report).await;
                    }
                    FailurePolicy::Skip => {
                        tracing::warn!(chunk = %chunk.id, "chunk failed, continuing: {source}");
                        report.chunks_failed += 1;
                        report.errors.push(format!("{}: {source}", chunk.id));
                    }
                },
            }
        }
        drop(outcomes);

        self.index.persist().await?;
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            repo = repo_name,
            files_scanned = report.files_scanned,
            files_indexed = report.files_indexed,
            files_empty = report.files_empty,
            extraction_failures = report.extraction_failures,
            chunks_created = report.chunks_created,
            chunks_skipped = report.chunks_skipped,
            chunks_failed = report.chunks_failed,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Read, extract and render every eligible file in traversal order.
    /// Unreadable files and extraction failures are recorded and skipped.
    pub async fn prepare_files(
        &self,
        repo_name: &str,
        root: &Path,
        report: &mut IndexReport,
    ) -> Vec<PreparedFile> {
        let mut prepared = Vec::new();

        let discovery = discover(root);
        report.errors.extend(discovery.errors);
        for path in discovery.files {
            report.files_scanned += 1;
            let file = match read_source(repo_name, root, &path).await {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(e) => {
                    report.errors.push(format!("{}: {e:#}", path.display()));
                    continue;
                }
            };

            if file.content.is_empty() {
                tracing::info!(file = %file.path_key, "skipping empty file");
                report.files_empty += 1;
                continue;
            }

            let record = match file.lang.extractor().extract(&file.content) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(file = %file.path_key, "extraction failed: {e}");
                    report.extraction_failures += 1;
                    report.errors.push(format!("{}: {e:#}", file.path_key));
                    continue;
                }
            };

            let amalgamation = render_amalgamation(&file.file_name, &file.path_key, &record);
            report.files_indexed += 1;
            prepared.push(PreparedFile {
                file_name: file.file_name,
                path_key: file.path_key,
                content: file.content,
                amalgamation,
            });
        }

        prepared
    }

    async fn process_chunk(&self, chunk: &Chunk) -> ChunkOutcome {
        if self.is_cancelled() {
            return ChunkOutcome::Cancelled;
        }
        match self.index.get(&chunk.id).await {
            Ok(Some(_)) => return ChunkOutcome::Exists,
            Ok(None) => {}
            Err(e) => return ChunkOutcome::Storage(e),
        }
        tracing::debug!(chunk = %chunk.id, files = chunk.file_names.len(), "embedding chunk");
        match self.embedder.embed(&chunk.combined_code).await {
            Ok(embedding) => ChunkOutcome::Embedded(embedding),
            Err(e) => ChunkOutcome::Failed(e),
        }
    }

    async fn stop(&self, err: IndexError, report: &IndexReport) -> Result<IndexReport> {
        tracing::warn!(
            chunks_created = report.chunks_created,
            chunks_skipped = report.chunks_skipped,
            "indexing stopped: {err}"
        );
        self.index.persist().await?;
        Err(err)
    }
}

fn to_entry(chunk: Chunk, embedding: Vec<f32>) -> IndexEntry {
    IndexEntry {
        id: chunk.id,
        embedding,
        document: chunk.combined_code,
        metadata: EntryMetadata {
            amalgamation: chunk.combined_metadata,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.chunk_size, 5);
        assert_eq!(config.embed_concurrency, 1);
        assert_eq!(config.on_failure, FailurePolicy::Abort);
        assert_eq!(config.id_scheme, ChunkIdScheme::FileNames);
    }

    #[test]
    fn index_report_defaults() {
        let report = IndexReport::default();
        assert_eq!(report.files_scanned, 0);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn to_entry_maps_fields() {
        let chunk = Chunk {
            id: "a.py:b.py".into(),
            file_names: vec!["a.py".into(), "b.py".into()],
            combined_code: "A = 1\n\nB = 2".into(),
            combined_metadata: "##a.py\n\n##b.py".into(),
        };
        let entry = to_entry(chunk, vec![0.5]);
        assert_eq!(entry.id, "a.py:b.py");
        assert_eq!(entry.document, "A = 1\n\nB = 2");
        assert_eq!(entry.metadata.amalgamation, "##a.py\n\n##b.py");
        assert_eq!(entry.embedding, vec![0.5]);
    }

    #[test]
    fn failure_policy_serde() {
        let policy: FailurePolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(policy, FailurePolicy::Skip);
    }
}
