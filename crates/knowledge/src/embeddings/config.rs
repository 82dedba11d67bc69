//! Embedding configuration.

use crate::types::EmbeddingModel;
use orgmem_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding provider settings, the `embedding` section of `knowledge.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", "mock"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default, rename = "apiKeyEnv", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            endpoint: None,
            api_key_env: None,
            timeout: None,
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by the trigram mock provider.
    pub fn mock(dimensions: usize) -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    /// Check the settings make sense before building a provider.
    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Provider and model recorded in an index built with this config.
    pub fn embedding_model(&self) -> EmbeddingModel {
        EmbeddingModel {
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }

    /// Check that vectors recorded as `stored` can share an index with the
    /// vectors this config produces.
    pub fn validate_consistency(&self, stored: &EmbeddingModel) -> AppResult<()> {
        if self.provider != stored.provider {
            return Err(AppError::Config(format!(
                "Provider mismatch: index was built with '{}', config uses '{}'",
                stored.provider, self.provider
            )));
        }

        if self.model != stored.model {
            return Err(AppError::Config(format!(
                "Model mismatch: index was built with '{}', config uses '{}'",
                stored.model, self.model
            )));
        }

        Ok(())
    }
}
