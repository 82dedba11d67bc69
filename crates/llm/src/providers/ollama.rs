//! Ollama generative model provider.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use crate::http::{self, classify_reqwest, error_from_response, line_stream};
use orgmem_core::{AppResult, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Default local endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama generate request.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options, nested as Ollama expects.
#[derive(Debug, Serialize, Default)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

/// Ollama generate response (also each NDJSON line when streaming).
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }

    /// Final completion, with surrounding whitespace stripped from the text.
    fn into_completion(self) -> LlmResponse {
        let usage = self.usage();
        LlmResponse {
            content: self.response.trim().to_string(),
            model: self.model,
            usage,
        }
    }
}

/// Ollama client.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for a base URL with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> AppResult<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http::build_client(timeout_secs)?,
        })
    }

    /// Create a client for the default local endpoint.
    pub fn local() -> AppResult<Self> {
        Self::new(DEFAULT_OLLAMA_URL, http::DEFAULT_TIMEOUT_SECS)
    }

    fn to_ollama_request(&self, request: &LlmRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                presence_penalty: request.presence_penalty,
                frequency_penalty: request.frequency_penalty,
            },
        }
    }

    async fn send(&self, body: &OllamaRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response("Ollama", response).await.into());
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(provider = "ollama", model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Sending completion request to Ollama");

        let response = self.send(&self.to_ollama_request(request, false)).await?;

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Ollama response: {}", e)))?;

        Ok(body.into_completion())
    }

    #[instrument(skip(self, request), fields(provider = "ollama", model = %request.model))]
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!("Starting streaming request to Ollama");

        let response = self.send(&self.to_ollama_request(request, true)).await?;

        Ok(line_stream(response, |line| Some(parse_stream_line(line))))
    }
}

/// Parse one NDJSON line of a streaming generate response.
fn parse_stream_line(line: &str) -> AppResult<LlmStreamChunk> {
    let parsed: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| ProviderError::InvalidResponse(format!("Ollama stream chunk: {}", e)))?;

    let usage = parsed.done.then(|| parsed.usage());
    Ok(LlmStreamChunk {
        content: parsed.response,
        done: parsed.done,
        usage,
    })
}
