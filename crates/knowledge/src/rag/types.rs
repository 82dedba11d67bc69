//! RAG response types.

use crate::types::RetrievalResult;
use orgmem_llm::LlmUsage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum snippet length for source references.
pub const MAX_SNIPPET_LENGTH: usize = 150;

/// How much an answer can be trusted, judged from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// No context was available; the model was not called
    #[serde(rename = "none")]
    None,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "medium-high")]
    MediumHigh,
    #[serde(rename = "high")]
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::MediumHigh => "medium-high",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counters reported by the generative model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl From<LlmUsage> for TokenUsage {
    fn from(usage: LlmUsage) -> Self {
        Self {
            prompt: usage.prompt_tokens,
            completion: usage.completion_tokens,
            total: usage.total_tokens,
        }
    }
}

/// Generated answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    /// Natural language answer
    pub answer: String,

    /// Positions (in the caller's chunk list) of the chunks placed in context
    pub sources_used: Vec<usize>,

    pub confidence: Confidence,

    pub tokens_used: TokenUsage,

    /// Model that produced the answer
    pub model: String,
}

/// Canned answer when no context is available.
pub const NO_CONTEXT_ANSWER: &str = "I don't have any relevant documents to answer this question.";

impl RagResponse {
    /// Response for a question with no usable context.
    pub fn no_context(model: impl Into<String>) -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources_used: Vec::new(),
            confidence: Confidence::None,
            tokens_used: TokenUsage::default(),
            model: model.into(),
        }
    }
}

/// A retrieved chunk the answer drew on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Originating document
    pub source: Option<String>,

    /// Position within the document
    pub chunk_id: Option<usize>,

    /// Retrieval score
    pub score: f32,

    /// Short excerpt of the chunk
    pub snippet: String,
}

impl SourceRef {
    pub fn from_result(result: &RetrievalResult) -> Self {
        Self {
            source: result.metadata.source.clone(),
            chunk_id: result.metadata.chunk_id,
            score: result.score,
            snippet: truncate_snippet(&result.text, MAX_SNIPPET_LENGTH),
        }
    }
}

/// Result of asking the knowledge base a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResult {
    #[serde(flatten)]
    pub response: RagResponse,

    /// Attribution for each entry of `response.sources_used`
    pub sources: Vec<SourceRef>,
}

impl AskResult {
    /// Attach attribution for the chunks the answer used.
    pub fn new(response: RagResponse, retrieved: &[RetrievalResult]) -> Self {
        let sources = response
            .sources_used
            .iter()
            .filter_map(|&i| retrieved.get(i))
            .map(SourceRef::from_result)
            .collect();

        Self { response, sources }
    }
}

/// Truncate snippet to at most `max_len` bytes, breaking at a word boundary.
pub fn truncate_snippet(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &text[..end];

    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
