//! Knowledge base: document ingestion, vector search and grounded answers.
//!
//! Documents are chunked and embedded into a persistent [`VectorIndex`].
//! Questions are embedded, matched against the index, and answered by an
//! [`AnswerGenerator`] from the retrieved chunks only. [`KnowledgeService`]
//! wires the pieces together and is the entry point for callers.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod ingest;
pub mod parser;
pub mod rag;
pub mod service;
pub mod tokenizer;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use config::{load_config, save_config, KnowledgeConfig};
pub use context::{AssembledContext, ContextAssembler};
pub use embeddings::{create_provider, embed_texts, EmbeddingConfig, EmbeddingProvider};
pub use ingest::IngestOptions;
pub use rag::{
    AnswerGenerator, AskResult, Confidence, GenerationSettings, RagResponse, RetryPolicy,
    SourceRef, StreamingAnswer, TokenUsage,
};
pub use service::{AskStream, KnowledgeService, Providers};
pub use tokenizer::{TiktokenTokenizer, Tokenizer, WhitespaceTokenizer};
pub use types::{
    ChunkMetadata, EmbeddingModel, IndexStats, IngestStats, Metric, RetrievalResult,
    SourceSummary,
};
pub use vector_index::VectorIndex;
