//! Test doubles shared by the scenario tests.

use futures::stream;
use orgmem_core::AppResult;
use orgmem_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Generative model that replays scripted answers and records requests.
pub struct ScriptedClient {
    outcomes: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(outcomes: Vec<AppResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &LlmRequest) -> AppResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("default answer".to_string()))
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.next(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(120, 30),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let content = self.next(request)?;
        let words: Vec<AppResult<LlmStreamChunk>> = content
            .split_inclusive(' ')
            .map(|word| {
                Ok(LlmStreamChunk {
                    content: word.to_string(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(words)))
    }
}
