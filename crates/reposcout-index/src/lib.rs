//! Repository indexing and semantic retrieval.
//!
//! Source files are parsed with tree-sitter into structural metadata
//! (function signatures, constants, class members), rendered into a stable
//! textual amalgamation, batched into fixed-size chunks, embedded, and stored
//! in a per-repository vector index. Queries are embedded and answered with
//! the amalgamations of the most similar chunks.

pub mod chunker;
pub mod error;
pub mod extract;
pub mod format;
pub mod indexer;
pub mod languages;
pub mod memory_store;
pub mod metadata;
#[cfg(feature = "qdrant")]
pub mod qdrant_store;
pub mod retriever;
pub mod source;
pub mod sqlite_store;
pub mod store;

pub use error::{IndexError, Result};
