//! Query entry point owning the process's single vector index.

use crate::config::KnowledgeConfig;
use crate::embeddings::EmbeddingProvider;
use crate::ingest::{self, IngestOptions};
use crate::rag::{
    AnswerGenerator, AskResult, GenerationSettings, RetryPolicy, SourceRef, StreamingAnswer,
};
use crate::tokenizer::Tokenizer;
use crate::types::{IndexStats, IngestStats, RetrievalResult};
use crate::vector_index::VectorIndex;
use orgmem_core::{AppError, AppResult};
use orgmem_llm::LlmClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// External capabilities the service is built from.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmClient>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

/// A streamed answer plus attribution for the chunks it draws on.
#[derive(Debug)]
pub struct AskStream {
    pub sources: Vec<SourceRef>,
    pub answer: StreamingAnswer,
}

/// Owns the vector index and the providers around it.
///
/// Build one per process with [`open`](Self::open) and share it; every
/// operation takes `&self`.
pub struct KnowledgeService {
    config: KnowledgeConfig,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: AnswerGenerator,
}

impl KnowledgeService {
    /// Open (or create) the index under `workspace` and wire the providers.
    ///
    /// `model` names the generative model sent with every request. An index
    /// built with a different embedding provider or model is refused with
    /// `Config`.
    pub fn open(
        workspace: &Path,
        config: KnowledgeConfig,
        model: impl Into<String>,
        providers: Providers,
    ) -> AppResult<Self> {
        config.validate()?;

        let dimension = config.embedding.dimensions;
        if providers.embedder.dimensions() != dimension {
            return Err(AppError::DimensionMismatch(format!(
                "embedding provider '{}' produces {} dimensions, index expects {}",
                providers.embedder.provider_name(),
                providers.embedder.dimensions(),
                dimension
            )));
        }

        let index_path = config.index_path(workspace);
        let mut index = VectorIndex::open(dimension, config.index.metric, &index_path)?;
        match index.embedding_model() {
            Some(stored) => config.embedding.validate_consistency(stored)?,
            None => index.set_embedding_model(config.embedding.embedding_model()),
        }
        let chunks = index.len()?;

        tracing::info!(
            path = %index_path.display(),
            chunks,
            dimension,
            metric = %config.index.metric,
            "Knowledge service ready"
        );

        let generation = &config.generation;
        let settings = GenerationSettings {
            model: model.into(),
            max_context_tokens: generation.max_context_tokens,
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
            include_citations: generation.include_citations,
            retry: RetryPolicy::new(generation.max_attempts),
        };

        Ok(Self {
            generator: AnswerGenerator::new(providers.llm, providers.tokenizer, settings),
            embedder: providers.embedder,
            index: Arc::new(index),
            config,
        })
    }

    /// Replace the retry policy from config.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.generator = self.generator.with_retry(retry);
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Answer a question from the indexed documents.
    ///
    /// # Errors
    /// `EmptyQuestion` for a blank question, `NoDocumentsIndexed` before any
    /// ingest, `Generation` when the model cannot produce an answer.
    pub async fn ask(&self, question: &str) -> AppResult<AskResult> {
        let retrieved = self.retrieve(question).await?;
        let texts: Vec<String> = retrieved.iter().map(|r| r.text.clone()).collect();

        let response = self.generator.generate(question, &texts).await?;

        tracing::info!(
            confidence = %response.confidence,
            sources = response.sources_used.len(),
            total_tokens = response.tokens_used.total,
            "Answered question"
        );

        Ok(AskResult::new(response, &retrieved))
    }

    /// Streaming variant of [`ask`](Self::ask).
    pub async fn ask_stream(&self, question: &str) -> AppResult<AskStream> {
        let retrieved = self.retrieve(question).await?;
        let texts: Vec<String> = retrieved.iter().map(|r| r.text.clone()).collect();

        let answer = self.generator.generate_stream(question, &texts).await?;
        let sources = answer
            .sources_used
            .iter()
            .filter_map(|&i| retrieved.get(i))
            .map(SourceRef::from_result)
            .collect();

        Ok(AskStream { sources, answer })
    }

    /// Semantic search without generation. `k` defaults to `retrieval.top_k`.
    pub async fn search(&self, query: &str, k: Option<usize>) -> AppResult<Vec<RetrievalResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        let k = k.unwrap_or(self.config.retrieval.top_k);
        let embedding = self.embedder.embed(query).await?;
        self.index.search(&embedding, k)
    }

    /// Ingest files or directories into the index.
    pub async fn ingest(&self, paths: Vec<PathBuf>) -> AppResult<IngestStats> {
        let options = IngestOptions {
            paths,
            chunking: self.config.chunking.clone(),
            batch_size: self.config.embedding.batch_size,
            ..Default::default()
        };
        self.ingest_with(&options).await
    }

    pub async fn ingest_with(&self, options: &IngestOptions) -> AppResult<IngestStats> {
        ingest::ingest_paths(&self.index, self.embedder.as_ref(), options).await
    }

    pub fn stats(&self) -> AppResult<IndexStats> {
        Ok(IndexStats {
            chunks_count: self.index.len()?,
            dimension: self.index.dimension(),
            metric: self.index.metric(),
            index_path: self.index.path().map(|p| p.display().to_string()),
            sources: self.index.sources()?,
        })
    }

    async fn retrieve(&self, question: &str) -> AppResult<Vec<RetrievalResult>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        if self.index.is_empty()? {
            tracing::warn!("Question received before any document was indexed");
            return Err(AppError::NoDocumentsIndexed);
        }

        let embedding = self.embedder.embed(question).await?;
        let retrieved = self.index.search(&embedding, self.config.retrieval.top_k)?;

        tracing::debug!(
            retrieved = retrieved.len(),
            top_score = retrieved.first().map(|r| r.score),
            "Retrieved chunks"
        );

        Ok(retrieved)
    }
}
