//! Fixed-size batching of prepared files into embedding chunks.

use serde::{Deserialize, Serialize};

/// Default number of files per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Separator between file names in a [`ChunkIdScheme::FileNames`] id.
pub const ID_SEPARATOR: &str = ":";

/// Separator between file contents and between amalgamations.
pub const CONTENT_SEPARATOR: &str = "\n\n";

/// How chunk ids are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkIdScheme {
    /// Colon-joined file names. Compatible with existing collections but
    /// collides when names contain `:` or repeat across directories.
    #[default]
    FileNames,
    /// blake3 over path keys and contents.
    ContentHash,
}

/// A file with its rendered amalgamation, ready to be batched.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub file_name: String,
    pub path_key: String,
    pub content: String,
    pub amalgamation: String,
}

/// One unit of embedding and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub file_names: Vec<String>,
    pub combined_code: String,
    pub combined_metadata: String,
}

/// Group files into chunks of `size` in the given order. Files with empty
/// content are dropped; the last chunk may be smaller.
#[must_use]
pub fn chunk_files(files: &[PreparedFile], size: usize, scheme: ChunkIdScheme) -> Vec<Chunk> {
    let eligible: Vec<&PreparedFile> = files.iter().filter(|f| !f.content.is_empty()).collect();

    eligible
        .chunks(size.max(1))
        .map(|batch| {
            let file_names: Vec<String> = batch.iter().map(|f| f.file_name.clone()).collect();
            let combined_code = batch
                .iter()
                .map(|f| f.content.as_str())
                .collect::<Vec<_>>()
                .join(CONTENT_SEPARATOR);
            let combined_metadata = batch
                .iter()
                .map(|f| f.amalgamation.as_str())
                .collect::<Vec<_>>()
                .join(CONTENT_SEPARATOR);
            let id = match scheme {
                ChunkIdScheme::FileNames => file_names.join(ID_SEPARATOR),
                ChunkIdScheme::ContentHash => content_hash(batch),
            };
            Chunk {
                id,
                file_names,
                combined_code,
                combined_metadata,
            }
        })
        .collect()
}

fn content_hash(batch: &[&PreparedFile]) -> String {
    let mut hasher = blake3::Hasher::new();
    for file in batch {
        hasher.update(file.path_key.as_bytes());
        hasher.update(&[0]);
        hasher.update(file.content.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}
