//! Token counting and truncation against the embedding model's context limit.

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::error::{LlmError, Result};

/// Tokenizer used to bound embedding input.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<usize>;

    /// Encode `text` and keep at most `max_tokens` leading tokens.
    fn truncate(&self, text: &str, max_tokens: usize) -> Vec<usize> {
        let mut tokens = self.encode(text);
        tokens.truncate(max_tokens);
        tokens
    }
}

/// `cl100k_base` BPE, the canonical encoding of OpenAI embedding models.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl std::fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cl100kTokenizer").finish_non_exhaustive()
    }
}

impl Cl100kTokenizer {
    /// # Errors
    ///
    /// Returns an error if the bundled BPE ranks fail to load.
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn encode(&self, text: &str) -> Vec<usize> {
        // Special-token markers in source files are plain text here.
        self.bpe.encode_ordinary(text)
    }
}
