//! Embedding generation.
//!
//! Provider-agnostic embedding through the `EmbeddingProvider` trait, plus
//! batching of arbitrary-length inputs.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use orgmem_core::{AppError, AppResult};

/// Embed `texts` in batches of at most `batch_size`.
///
/// Texts are trimmed and blank ones dropped first; the result holds one
/// vector per surviving text, in input order.
///
/// # Errors
/// `AppError::EmptyInput` if no text survives trimming.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    let cleaned: Vec<String> = texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if cleaned.is_empty() {
        return Err(AppError::EmptyInput);
    }

    let batch_size = batch_size.max(1);
    let batches = cleaned.len().div_ceil(batch_size);

    tracing::info!(
        texts = cleaned.len(),
        dropped = texts.len() - cleaned.len(),
        batches,
        provider = provider.provider_name(),
        model = provider.model_name(),
        "Embedding texts"
    );

    let mut embeddings = Vec::with_capacity(cleaned.len());
    for (i, batch) in cleaned.chunks(batch_size).enumerate() {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        tracing::debug!(batch = i + 1, batches, size = batch.len(), "Embedded batch");
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}
