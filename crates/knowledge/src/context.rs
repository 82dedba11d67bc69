//! Token-bounded context assembly.
//!
//! Chunks arrive ranked by relevance. They are packed greedily in that order
//! until the budget runs out; the first chunk that does not fit may be cut
//! down to a prefix if enough budget is left for the prefix to be useful.

use crate::tokenizer::Tokenizer;

/// Below this many remaining tokens a truncated chunk is not worth including.
pub const MIN_USEFUL_TOKENS: usize = 100;

/// Appended to a chunk that was cut short.
pub const ELISION_MARKER: &str = "...";

const SEPARATOR: &str = "\n\n";

/// Context string plus the positions of the chunks it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    pub context: String,

    /// Positions in the input slice, in emission order
    pub used_indices: Vec<usize>,

    /// Tokens consumed, as measured piece by piece
    pub tokens: usize,

    /// Whether the last included chunk was cut short
    pub truncated: bool,
}

/// Packs ranked chunks into a token budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    include_citations: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ContextAssembler {
    /// With `include_citations`, each chunk is prefixed with `[Source i]`.
    pub fn new(include_citations: bool) -> Self {
        Self { include_citations }
    }

    pub fn include_citations(&self) -> bool {
        self.include_citations
    }

    /// Assemble `chunks` into at most `max_tokens` tokens.
    pub fn assemble<S: AsRef<str>>(
        &self,
        chunks: &[S],
        max_tokens: usize,
        tokenizer: &dyn Tokenizer,
    ) -> AssembledContext {
        let mut out = AssembledContext::default();

        for (position, chunk) in chunks.iter().enumerate() {
            let body = chunk.as_ref();
            let lead = self.lead(out.used_indices.len());
            let piece = format!("{}{}", lead, body);
            let cost = tokenizer.count(&piece);
            let remaining = max_tokens - out.tokens;

            if cost <= remaining {
                out.context.push_str(&piece);
                out.tokens += cost;
                out.used_indices.push(position);
                continue;
            }

            if remaining > MIN_USEFUL_TOKENS {
                if let Some((piece, cost)) = self.truncated_piece(&lead, body, remaining, tokenizer) {
                    out.context.push_str(&piece);
                    out.tokens += cost;
                    out.used_indices.push(position);
                    out.truncated = true;
                }
            }

            tracing::debug!(
                included = out.used_indices.len(),
                dropped = chunks.len() - out.used_indices.len(),
                tokens = out.tokens,
                max_tokens,
                "Context budget reached"
            );
            break;
        }

        out
    }

    /// Separator and citation header for the `emitted`-th included chunk.
    fn lead(&self, emitted: usize) -> String {
        let separator = if emitted == 0 { "" } else { SEPARATOR };
        if self.include_citations {
            format!("{}[Source {}]\n", separator, emitted + 1)
        } else {
            separator.to_string()
        }
    }

    /// Longest `lead + prefix + marker` that fits in `remaining`.
    fn truncated_piece(
        &self,
        lead: &str,
        body: &str,
        remaining: usize,
        tokenizer: &dyn Tokenizer,
    ) -> Option<(String, usize)> {
        let overhead = tokenizer.count(lead) + tokenizer.count(ELISION_MARKER);
        let mut budget = remaining.checked_sub(overhead)?;

        // Re-tokenizing a joined string can differ from the sum of its parts.
        while budget > 0 {
            let prefix = tokenizer.truncate(body, budget);
            if prefix.is_empty() {
                return None;
            }
            let piece = format!("{}{}{}", lead, prefix, ELISION_MARKER);
            let cost = tokenizer.count(&piece);
            if cost <= remaining {
                return Some((piece, cost));
            }
            budget -= 1;
        }
        None
    }
}
