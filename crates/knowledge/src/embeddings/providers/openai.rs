//! OpenAI embedding provider.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use orgmem_core::{AppError, AppResult, ProviderError};
use orgmem_llm::http::{build_client, classify_reqwest, error_from_response, DEFAULT_TIMEOUT_SECS};
use orgmem_llm::providers::openai::DEFAULT_OPENAI_URL;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// OpenAI `/embeddings` client. One request per batch.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> AppResult<Self> {
        let base_url = config.endpoint.as_deref().unwrap_or(DEFAULT_OPENAI_URL);

        Ok(Self {
            client: build_client(config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

/// Put vectors back in input order and check their shape.
fn into_ordered(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "OpenAI returned {} embeddings for {} inputs",
            data.len(),
            expected
        ))
        .into());
    }

    data.sort_by_key(|d| d.index);

    if let Some(bad) = data.iter().find(|d| d.embedding.len() != dimensions) {
        return Err(AppError::DimensionMismatch(format!(
            "OpenAI returned {} dimensions, expected {}",
            bad.embedding.len(),
            dimensions
        )));
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!("Embedding batch of {} texts", texts.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: self.dimensions,
            })
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response("OpenAI", response).await.into());
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("OpenAI embeddings: {}", e)))?;

        into_ordered(body.data, texts.len(), self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let input = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
            dimensions: 1536,
        })
        .unwrap();

        assert_eq!(json["input"][1], "b");
        assert_eq!(json["dimensions"], 1536);
    }

    #[test]
    fn test_response_reordered_by_index() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
        )
        .unwrap();

        let vectors = into_ordered(body.data, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_response_shape_checked() {
        let short = vec![EmbeddingData {
            index: 0,
            embedding: vec![1.0],
        }];
        assert_eq!(
            into_ordered(short, 1, 2).unwrap_err().code(),
            "DIMENSION_MISMATCH"
        );

        let missing = vec![EmbeddingData {
            index: 0,
            embedding: vec![1.0, 0.0],
        }];
        assert_eq!(into_ordered(missing, 2, 2).unwrap_err().code(), "PROVIDER_ERROR");
    }

    #[test]
    fn test_endpoint_override() {
        let config = EmbeddingConfig {
            endpoint: Some("https://proxy.internal/v1/".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config, "sk-test").unwrap();
        assert_eq!(provider.base_url, "https://proxy.internal/v1");
    }
}
