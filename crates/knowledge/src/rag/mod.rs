//! Retrieval-augmented answer generation.
//!
//! Turns ranked retrieval results into a grounded answer: context assembly
//! under a token budget, a retried generative model call and a confidence
//! grade derived from the answer's wording.

pub mod confidence;
pub mod generator;
pub mod prompt;
pub mod retry;
pub mod types;

pub use generator::{AnswerGenerator, GenerationSettings, StreamingAnswer};
pub use retry::{Attempt, RetryPolicy};
pub use types::{AskResult, Confidence, RagResponse, SourceRef, TokenUsage};
