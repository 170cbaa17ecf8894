//! Explicit request-layer state: configuration, embedder, and the active
//! repository.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reposcout_index::indexer::{IndexReport, RepoIndexer};
use reposcout_index::retriever::RepoSearcher;
use reposcout_index::store::{VectorIndex, open_collection};
use reposcout_llm::http::client_with_timeout;
use reposcout_llm::openai::OpenAiEmbeddings;
use reposcout_llm::tokenizer::Cl100kTokenizer;
use reposcout_llm::{Embedder, EmbeddingProvider};
use tokio::sync::{Mutex, RwLock, watch};

use crate::config::{Config, EmbeddingProviderKind};
use crate::error::{Result, SessionError};

const LOADED_MESSAGE: &str = "This repo has been successfully loaded and is now active";
const ENTRYPOINTS_HEADER: &str = "Some entrypoint files in repo:";

/// Outcome of loading a repository.
#[derive(Debug)]
pub struct LoadSummary {
    pub repo_name: String,
    pub report: IndexReport,
    /// Search result for the configured entrypoint query.
    pub entrypoints: String,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LOADED_MESSAGE}\n{ENTRYPOINTS_HEADER}\n{}", self.entrypoints)
    }
}

/// Repository name from a clone URL: last path segment without `.git`.
#[must_use]
pub fn repo_name_from_url(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_owned()
}

pub struct Session<P: EmbeddingProvider> {
    config: Config,
    embedder: Arc<Embedder<P>>,
    collections: Mutex<HashMap<String, Arc<dyn VectorIndex>>>,
    active: RwLock<Option<String>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Session<OpenAiEmbeddings> {
    /// Build a session backed by the configured HTTP embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingApiKey`] without a key, or an embedding
    /// error if the HTTP client or tokenizer cannot be created.
    pub fn from_config(config: Config) -> Result<Self> {
        let api_key = config
            .secrets
            .api_key
            .as_ref()
            .ok_or(SessionError::MissingApiKey)?
            .expose()
            .to_owned();
        let embedding = &config.embedding;
        let provider = match embedding.provider {
            EmbeddingProviderKind::OpenAi => {
                let client = client_with_timeout(Duration::from_secs(embedding.timeout_secs))?;
                OpenAiEmbeddings::new(
                    client,
                    api_key,
                    embedding.base_url.clone(),
                    embedding.model.clone(),
                )
                .with_context_limit(embedding.max_input_tokens)
            }
        };
        Self::new(config, provider)
    }
}

impl<P: EmbeddingProvider> Session<P> {
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be loaded.
    pub fn new(config: Config, provider: P) -> Result<Self> {
        let embedder = Embedder::new(
            Arc::new(provider),
            Arc::new(Cl100kTokenizer::new()?),
            config.embedding.max_input_tokens,
            config.embedding.retry.policy(),
        );
        Ok(Self {
            config,
            embedder: Arc::new(embedder),
            collections: Mutex::new(HashMap::new()),
            active: RwLock::new(None),
            shutdown: None,
        })
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<Embedder<P>> {
        &self.embedder
    }

    pub async fn active_repository(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    async fn collection(&self, repo_name: &str) -> Result<Arc<dyn VectorIndex>> {
        let mut collections = self.collections.lock().await;
        if let Some(index) = collections.get(repo_name) {
            return Ok(Arc::clone(index));
        }
        let index = open_collection(&self.config.index.store_options(), repo_name).await?;
        collections.insert(repo_name.to_owned(), Arc::clone(&index));
        Ok(index)
    }

    fn resolve_root(&self, repo_name: &str, path: Option<&Path>) -> Result<PathBuf> {
        let root = path.map_or_else(|| self.config.repo_path(repo_name), Path::to_path_buf);
        if root.is_dir() {
            Ok(root)
        } else {
            Err(SessionError::MissingRepository(root))
        }
    }

    /// Run the indexing pipeline without changing the active repository.
    ///
    /// `path` defaults to the repository's working copy under the repo cache.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingRepository`] if the working copy does
    /// not exist, or the pipeline error.
    pub async fn index_repository(
        &self,
        repo_name: &str,
        path: Option<&Path>,
    ) -> Result<IndexReport> {
        let root = self.resolve_root(repo_name, path)?;
        let index = self.collection(repo_name).await?;
        let mut indexer = RepoIndexer::new(
            index,
            Arc::clone(&self.embedder),
            self.config.index.indexer_config(),
        );
        if let Some(rx) = &self.shutdown {
            indexer = indexer.with_shutdown(rx.clone());
        }
        Ok(indexer.index_repository(repo_name, &root).await?)
    }

    /// Index a repository, make it active, and surface its entry points.
    ///
    /// # Errors
    ///
    /// Same as [`Session::index_repository`]; the active repository is left
    /// unchanged on failure.
    pub async fn load_repository(
        &self,
        repo_name: &str,
        path: Option<&Path>,
    ) -> Result<LoadSummary> {
        let report = self.index_repository(repo_name, path).await?;
        *self.active.write().await = Some(repo_name.to_owned());
        tracing::info!(repo = repo_name, "repository loaded and active");

        let entrypoints = self
            .search_repository(
                repo_name,
                &self.config.search.entrypoint_query,
                self.config.search.top_k,
            )
            .await?;
        Ok(LoadSummary {
            repo_name: repo_name.to_owned(),
            report,
            entrypoints,
        })
    }

    /// Search the active repository with the configured top-k.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] when no repository is active.
    pub async fn search(&self, query: &str) -> Result<String> {
        let repo_name = self
            .active_repository()
            .await
            .ok_or(SessionError::NotLoaded)?;
        self.search_repository(&repo_name, query, self.config.search.top_k)
            .await
    }

    /// Search an explicit repository. The active repository is not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be opened or the query fails.
    pub async fn search_repository(&self, repo_name: &str, query: &str, k: usize) -> Result<String> {
        let index = self.collection(repo_name).await?;
        let searcher = RepoSearcher::new(index, Arc::clone(&self.embedder));
        Ok(searcher.search(query, k).await?)
    }
}

#[cfg(test)]
mod tests {
    use reposcout_index::IndexError;
    use reposcout_index::store::IndexBackend;
    use reposcout_llm::LlmError;
    use reposcout_llm::mock::MockEmbeddingProvider;

    use super::*;

    fn test_config(repo_cache: &Path) -> Config {
        let mut config = Config::default();
        config.index.backend = IndexBackend::Memory;
        config.index.repo_cache_dir = repo_cache.to_path_buf();
        config.embedding.retry.min_wait_ms = 1;
        config.embedding.retry.max_wait_ms = 2;
        config
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn session(repo_cache: &Path) -> Session<MockEmbeddingProvider> {
        Session::new(test_config(repo_cache), MockEmbeddingProvider::new(16)).unwrap()
    }

    #[test]
    fn repo_name_from_clone_urls() {
        assert_eq!(repo_name_from_url("https://github.com/pallets/flask.git"), "flask");
        assert_eq!(repo_name_from_url("https://github.com/pallets/flask"), "flask");
        assert_eq!(repo_name_from_url("https://github.com/pallets/flask/"), "flask");
        assert_eq!(repo_name_from_url("git@github.com:pallets/flask.git"), "flask");
        assert_eq!(repo_name_from_url("flask"), "flask");
    }

    #[test]
    fn load_summary_display() {
        let summary = LoadSummary {
            repo_name: "demo".into(),
            report: IndexReport::default(),
            entrypoints: "##main.py(demo/main.py)".into(),
        };
        assert_eq!(
            summary.to_string(),
            "This repo has been successfully loaded and is now active\n\
             Some entrypoint files in repo:\n##main.py(demo/main.py)"
        );
    }

    #[tokio::test]
    async fn search_before_load_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let err = session.search("main").await.unwrap_err();
        assert!(matches!(err, SessionError::NotLoaded));
        assert_eq!(session.embedder().provider().call_count(), 0);
    }

    #[tokio::test]
    async fn missing_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        let err = session.load_repository("ghost", None).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingRepository(p) if p.ends_with("ghost")));
        assert!(session.active_repository().await.is_none());
    }

    #[tokio::test]
    async fn load_defaults_to_repo_cache_and_activates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "demo/main.py", "def main(argv):\n    return 0\n");
        write(dir.path(), "demo/util.js", "const PORT = 80;\n");

        let session = session(dir.path());
        let summary = session.load_repository("demo", None).await.unwrap();

        assert_eq!(summary.report.files_indexed, 2);
        assert_eq!(summary.report.chunks_created, 1);
        assert!(summary.entrypoints.contains("main(argv)"));
        assert!(summary.entrypoints.contains("PORT=80"));
        assert_eq!(session.active_repository().await.as_deref(), Some("demo"));

        let result = session.search("entry point").await.unwrap();
        assert!(result.starts_with("##main.py(demo/main.py)"));
    }

    #[tokio::test]
    async fn reload_reuses_collection() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "demo/a.py", "def a():\n    pass\n");
        let session = session(dir.path());

        session.load_repository("demo", None).await.unwrap();
        let calls = session.embedder().provider().call_count();
        let second = session.load_repository("demo", None).await.unwrap();

        assert_eq!(second.report.chunks_created, 0);
        assert_eq!(second.report.chunks_skipped, 1);
        // Only the entrypoint query is embedded on the second load.
        assert_eq!(session.embedder().provider().call_count(), calls + 1);
    }

    #[tokio::test]
    async fn explicit_path_and_search_repository() {
        let cache = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        write(elsewhere.path(), "lib.py", "LIMIT = 3\n");

        let session = session(cache.path());
        session
            .index_repository("other", Some(elsewhere.path()))
            .await
            .unwrap();
        assert!(session.active_repository().await.is_none());

        let result = session.search_repository("other", "limit", 5).await.unwrap();
        assert!(result.contains("LIMIT=3"));
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_active() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "first/a.py", "def a():\n    pass\n");
        write(dir.path(), "second/b.py", "def b():\n    pass\n");
        let session = session(dir.path());
        session.load_repository("first", None).await.unwrap();

        session
            .embedder()
            .provider()
            .push_failure(LlmError::InvalidRequest("too long".into()));
        let err = session.load_repository("second", None).await.unwrap_err();

        assert!(matches!(err, SessionError::Index(IndexError::ChunkFailed { .. })));
        assert_eq!(session.active_repository().await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn cancelled_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "demo/a.py", "def a():\n    pass\n");
        let (tx, rx) = watch::channel(false);
        let session = session(dir.path()).with_shutdown(rx);
        tx.send(true).unwrap();

        let err = session.load_repository("demo", None).await.unwrap_err();
        assert!(matches!(err, SessionError::Index(IndexError::Cancelled)));
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = Config::default();
        let err = Session::from_config(config).err().unwrap();
        assert!(matches!(err, SessionError::MissingApiKey));
    }
}
