mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let retry = &self.embedding.retry;
        if self.index.chunk_size == 0 {
            bail!("index.chunk_size must be at least 1");
        }
        if self.index.embed_concurrency == 0 {
            bail!("index.embed_concurrency must be at least 1");
        }
        if self.search.top_k == 0 {
            bail!("search.top_k must be at least 1");
        }
        if self.embedding.max_input_tokens == 0 {
            bail!("embedding.max_input_tokens must be at least 1");
        }
        if retry.max_attempts == 0 {
            bail!("embedding.retry.max_attempts must be at least 1");
        }
        if retry.min_wait_ms > retry.max_wait_ms {
            bail!(
                "embedding.retry.min_wait_ms ({}) exceeds max_wait_ms ({})",
                retry.min_wait_ms,
                retry.max_wait_ms
            );
        }
        Ok(())
    }

    /// Working copy of `repo_name` under the repository cache.
    #[must_use]
    pub fn repo_path(&self, repo_name: &str) -> PathBuf {
        self.index.repo_cache_dir.join(repo_name)
    }
}

/// Priority: CLI `--config` > `REPOSCOUT_CONFIG` env > `reposcout.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOSCOUT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("reposcout.toml")
}
