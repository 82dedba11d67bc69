//! Ollama embedding provider.
//!
//! Calls `/api/embeddings` once per text; Ollama has no batch endpoint for
//! this route. Transient failures are retried with exponential backoff.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use orgmem_core::{AppError, AppResult, ProviderError};
use orgmem_llm::http::{build_client, classify_reqwest, error_from_response, DEFAULT_TIMEOUT_SECS};
use orgmem_llm::providers::ollama::DEFAULT_OLLAMA_URL;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Maximum attempts per text
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Ollama embedding provider using the local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaProvider {
    /// Create a provider from configuration.
    ///
    /// The endpoint comes from the config, then `OLLAMA_URL`, then the
    /// local default.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client: build_client(config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 1;
        loop {
            match self.embed_single(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(AppError::Provider(e)) if retryable(&e) && attempt < MAX_RETRIES => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_RETRIES, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response("Ollama", response).await.into());
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Ollama embedding: {}", e)))?;

        if body.embedding.len() != self.dimensions {
            return Err(AppError::DimensionMismatch(format!(
                "Ollama model '{}' returned {} dimensions, expected {}",
                self.model,
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }
}

/// Rate limits, timeouts and dropped connections are worth retrying locally.
fn retryable(err: &ProviderError) -> bool {
    err.is_transient() || matches!(err, ProviderError::Transport(_))
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_with_retries(text).await?);
        }
        Ok(embeddings)
    }
}
