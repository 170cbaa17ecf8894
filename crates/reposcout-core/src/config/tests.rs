use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reposcout_index::chunker::ChunkIdScheme;
use reposcout_index::indexer::FailurePolicy;
use reposcout_index::store::IndexBackend;
use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 12] = [
    "REPOSCOUT_EMBEDDING_BASE_URL",
    "REPOSCOUT_EMBEDDING_MODEL",
    "REPOSCOUT_CACHE_DIR",
    "REPOSCOUT_REPO_CACHE_DIR",
    "REPOSCOUT_INDEX_BACKEND",
    "REPOSCOUT_CHUNK_SIZE",
    "REPOSCOUT_EMBED_CONCURRENCY",
    "REPOSCOUT_TOP_K",
    "REPOSCOUT_QDRANT_URL",
    "REPOSCOUT_API_KEY",
    "REPOSCOUT_CONFIG",
    "OPENAI_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/reposcout.toml")).unwrap();
    assert_eq!(config.index.chunk_size, 5);
    assert_eq!(config.index.backend, IndexBackend::Sqlite);
    assert_eq!(config.index.chunk_ids, ChunkIdScheme::FileNames);
    assert_eq!(config.index.on_chunk_failure, FailurePolicy::Abort);
    assert_eq!(config.index.embed_concurrency, 1);
    assert_eq!(config.search.top_k, 3);
    assert_eq!(config.search.entrypoint_query, "main");
    assert_eq!(config.embedding.model, "text-embedding-ada-002");
    assert_eq!(config.embedding.max_input_tokens, 8191);
    assert!(config.secrets.api_key.is_none());
    config.validate().unwrap();
}

#[test]
#[serial]
fn parses_partial_toml() {
    clear_env();
    let file = write_config(
        r#"
[index]
backend = "memory"
chunk_size = 8
chunk_ids = "content_hash"
on_chunk_failure = "skip"

[embedding.retry]
max_attempts = 2
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.index.chunk_size, 8);
    assert_eq!(config.index.chunk_ids, ChunkIdScheme::ContentHash);
    assert_eq!(config.index.on_chunk_failure, FailurePolicy::Skip);
    assert_eq!(config.embedding.retry.max_attempts, 2);
    assert_eq!(config.embedding.retry.min_wait_ms, 1_000);
    assert_eq!(config.search.top_k, 3);
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let file = write_config("[index\nchunk_size = ");
    assert!(Config::load(file.path()).is_err());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let file = write_config("[index]\nchunk_size = 8\n");
    unsafe {
        std::env::set_var("REPOSCOUT_CHUNK_SIZE", "2");
        std::env::set_var("REPOSCOUT_INDEX_BACKEND", "Qdrant");
        std::env::set_var("REPOSCOUT_TOP_K", "7");
        std::env::set_var("REPOSCOUT_CACHE_DIR", "/tmp/rs-cache");
        std::env::set_var("REPOSCOUT_EMBEDDING_MODEL", "text-embedding-3-small");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.index.chunk_size, 2);
    assert_eq!(config.index.backend, IndexBackend::Qdrant);
    assert_eq!(config.search.top_k, 7);
    assert_eq!(config.index.cache_dir, Path::new("/tmp/rs-cache"));
    assert_eq!(config.embedding.model, "text-embedding-3-small");
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("REPOSCOUT_CHUNK_SIZE", "lots");
        std::env::set_var("REPOSCOUT_INDEX_BACKEND", "postgres");
    }
    let config = Config::load(Path::new("/nonexistent/reposcout.toml")).unwrap();
    clear_env();

    assert_eq!(config.index.chunk_size, 5);
    assert_eq!(config.index.backend, IndexBackend::Sqlite);
}

#[test]
#[serial]
fn api_key_prefers_reposcout_variable() {
    clear_env();
    unsafe {
        std::env::set_var("OPENAI_API_KEY", "sk-openai");
        std::env::set_var("REPOSCOUT_API_KEY", "sk-reposcout");
    }
    let config = Config::load(Path::new("/nonexistent/reposcout.toml")).unwrap();
    clear_env();

    let key = config.secrets.api_key.unwrap();
    assert_eq!(key.expose(), "sk-reposcout");
}

#[test]
#[serial]
fn api_key_falls_back_to_openai_variable() {
    clear_env();
    unsafe {
        std::env::set_var("OPENAI_API_KEY", "sk-openai");
        std::env::set_var("REPOSCOUT_API_KEY", "  ");
    }
    let config = Config::load(Path::new("/nonexistent/reposcout.toml")).unwrap();
    clear_env();

    assert_eq!(config.secrets.api_key.unwrap().expose(), "sk-openai");
}

#[test]
fn validate_rejects_zero_chunk_size() {
    let mut config = Config::default();
    config.index.chunk_size = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chunk_size"));
}

#[test]
fn validate_rejects_inverted_retry_bounds() {
    let mut config = Config::default();
    config.embedding.retry.min_wait_ms = 5_000;
    config.embedding.retry.max_wait_ms = 10;
    assert!(config.validate().is_err());
}

#[test]
fn retry_policy_zero_elapsed_means_unbounded() {
    let mut retry = RetryConfig::default();
    assert_eq!(retry.policy().max_elapsed, Some(Duration::from_secs(120)));
    retry.max_elapsed_secs = 0;
    assert_eq!(retry.policy().max_elapsed, None);
    assert_eq!(retry.policy().min_wait, Duration::from_secs(1));
}

#[test]
fn index_config_maps_to_pipeline_settings() {
    let index = IndexConfig {
        chunk_size: 9,
        embed_concurrency: 3,
        backend: IndexBackend::Memory,
        ..IndexConfig::default()
    };

    let indexer = index.indexer_config();
    assert_eq!(indexer.chunk_size, 9);
    assert_eq!(indexer.embed_concurrency, 3);

    let store = index.store_options();
    assert_eq!(store.backend, IndexBackend::Memory);
    assert_eq!(store.cache_dir, Path::new(".cache"));
}

#[test]
fn repo_path_joins_repo_cache() {
    let config = Config::default();
    assert_eq!(config.repo_path("flask"), Path::new(".cache/repo/flask"));
}

#[test]
#[serial]
fn config_path_priority() {
    clear_env();
    assert_eq!(resolve_config_path(None), Path::new("reposcout.toml"));
    unsafe { std::env::set_var("REPOSCOUT_CONFIG", "/etc/rs.toml") };
    assert_eq!(resolve_config_path(None), Path::new("/etc/rs.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        Path::new("cli.toml")
    );
    clear_env();
}
