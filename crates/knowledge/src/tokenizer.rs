//! Token counting for context budgets.

use anyhow::Context;
use orgmem_core::{AppError, AppResult};
use tiktoken_rs::CoreBPE;

/// Encoding used when a model name is not known to tiktoken.
pub const FALLBACK_ENCODING: &str = "cl100k_base";

/// Counts and slices text in model tokens.
///
/// `truncate(text, n)` must return text whose `count` is at most `n`.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Longest prefix of `text` that fits in `max_tokens` tokens.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;
}

/// BPE tokenizer matching the generative model's encoding.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Tokenizer for `model`, falling back to `cl100k_base` for unknown names.
    pub fn for_model(model: &str) -> AppResult<Self> {
        let bpe = resolve_bpe(model)
            .map_err(|e| AppError::Config(format!("Failed to load tokenizer: {:#}", e)))?;
        Ok(Self { bpe })
    }
}

fn resolve_bpe(model: &str) -> anyhow::Result<CoreBPE> {
    match tiktoken_rs::get_bpe_from_model(model) {
        Ok(bpe) => Ok(bpe),
        Err(_) => {
            tracing::debug!(model, "No tokenizer registered for model, using {}", FALLBACK_ENCODING);
            tiktoken_rs::cl100k_base().context("loading cl100k_base encoding")
        }
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        // A cut can land inside a multi-byte character; back off until the
        // prefix decodes.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(prefix) = self.bpe.decode(tokens[..end].to_vec()) {
                return prefix;
            }
            end -= 1;
        }
        String::new()
    }
}

/// Whitespace-delimited word counter, for tests and offline use.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        text.split_whitespace()
            .take(max_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
