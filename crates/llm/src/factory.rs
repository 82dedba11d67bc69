//! Generative model client factory.
//!
//! Resolves a provider name to a concrete client, injecting the endpoint,
//! API key and timeout taken from configuration.

use crate::client::LlmClient;
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::providers::ollama::DEFAULT_OLLAMA_URL;
use crate::providers::openai::DEFAULT_OPENAI_URL;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use orgmem_core::{AppError, AppResult};
use std::sync::Arc;

/// Create a generative model client for a provider name.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required API
/// key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout_secs: Option<u64>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;
    let timeout = timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            Ok(Arc::new(OllamaClient::new(base_url, timeout)?))
        }
        ProviderType::OpenAI => {
            let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let base_url = endpoint.unwrap_or(DEFAULT_OPENAI_URL);
            Ok(Arc::new(OpenAiClient::new(base_url, api_key, timeout)?))
        }
    }
}
