//! Eligible source file discovery under a repository root.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::languages::{Lang, detect_language, is_indexable};

/// One source file read from the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// `<repo name>/<path relative to the root>`, always `/`-separated.
    pub path_key: String,
    pub file_name: String,
    pub lang: Lang,
    pub content: String,
}

/// Result of walking a repository root.
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    /// Entries the walker could not read, such as unreadable directories.
    pub errors: Vec<String>,
}

/// Paths of indexable files in stable order: depth-first, entries sorted by
/// name at each level. Honors `.gitignore` and skips hidden entries.
#[must_use]
pub fn discover(root: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file()) && is_indexable(entry.path()) {
                    discovery.files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), "walk error: {e}");
                discovery.errors.push(e.to_string());
            }
        }
    }
    discovery
}

/// Path key of `path` for a repository named `repo_name` rooted at `root`.
#[must_use]
pub fn path_key(repo_name: &str, root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{repo_name}/{rel}")
}

/// Read one discovered file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read as UTF-8.
pub async fn read_source(repo_name: &str, root: &Path, path: &Path) -> Result<Option<SourceFile>> {
    let Some(lang) = detect_language(path) else {
        return Ok(None);
    };
    let content = tokio::fs::read_to_string(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(SourceFile {
        path_key: path_key(repo_name, root, path),
        file_name,
        lang,
        content,
    }))
}
