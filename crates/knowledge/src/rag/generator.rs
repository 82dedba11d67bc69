//! Grounded answer generation.
//!
//! Validates the question, packs the retrieved chunks into a token-bounded
//! context, calls the generative model under the retry policy and grades
//! the answer's confidence.

use super::confidence;
use super::prompt::{build_system_prompt, build_user_prompt};
use super::retry::{into_failure, RetryPolicy};
use super::types::{RagResponse, TokenUsage, NO_CONTEXT_ANSWER};
use crate::context::ContextAssembler;
use crate::tokenizer::Tokenizer;
use futures::stream::{self, BoxStream, StreamExt};
use orgmem_core::{AppError, AppResult};
use orgmem_llm::{LlmClient, LlmRequest};
use std::sync::Arc;

/// Characters of the question included in log lines.
const QUESTION_LOG_PREFIX: usize = 100;

/// Sampling and budget settings for answer generation.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub max_context_tokens: usize,
    /// Clamped to `[0, 1]`
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub include_citations: bool,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_context_tokens: 3000,
            temperature: 0.2,
            max_output_tokens: 1000,
            include_citations: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// A streamed answer. Metadata is known before the first fragment.
pub struct StreamingAnswer {
    /// Positions of the chunks placed in context
    pub sources_used: Vec<usize>,

    pub model: String,

    /// Text fragments in arrival order; an `Err` item is always the last one
    pub fragments: BoxStream<'static, AppResult<String>>,
}

impl std::fmt::Debug for StreamingAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnswer")
            .field("sources_used", &self.sources_used)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

enum Prepared {
    NoContext,
    Ready {
        request: LlmRequest,
        sources_used: Vec<usize>,
    },
}

/// Produces grounded answers from retrieved chunks.
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    tokenizer: Arc<dyn Tokenizer>,
    assembler: ContextAssembler,
    settings: GenerationSettings,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        tokenizer: Arc<dyn Tokenizer>,
        mut settings: GenerationSettings,
    ) -> Self {
        settings.temperature = settings.temperature.clamp(0.0, 1.0);
        Self {
            client,
            tokenizer,
            assembler: ContextAssembler::new(settings.include_citations),
            settings,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.settings.retry = retry;
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Answer `question` from `chunks`, ranked most relevant first.
    ///
    /// `sources_used` in the response indexes into `chunks`.
    pub async fn generate(&self, question: &str, chunks: &[String]) -> AppResult<RagResponse> {
        let (request, sources_used) = match self.prepare(question, chunks)? {
            Prepared::NoContext => {
                tracing::info!("No usable context, returning canned answer");
                return Ok(RagResponse::no_context(&self.settings.model));
            }
            Prepared::Ready {
                request,
                sources_used,
            } => (request, sources_used),
        };

        let response = self
            .settings
            .retry
            .run(|_| self.client.complete(&request))
            .await?;

        let confidence = confidence::assess(&response.content);
        let tokens_used = TokenUsage::from(response.usage);

        tracing::info!(
            confidence = %confidence,
            sources_used = sources_used.len(),
            prompt_tokens = tokens_used.prompt,
            completion_tokens = tokens_used.completion,
            "Generated answer"
        );

        Ok(RagResponse {
            answer: response.content,
            sources_used,
            confidence,
            tokens_used,
            model: if response.model.is_empty() {
                self.settings.model.clone()
            } else {
                response.model
            },
        })
    }

    /// Streaming variant of [`generate`](Self::generate).
    ///
    /// Opening the stream is retried; once fragments flow, a failure ends
    /// the stream with one `Err` item and fragments already sent stand.
    pub async fn generate_stream(
        &self,
        question: &str,
        chunks: &[String],
    ) -> AppResult<StreamingAnswer> {
        let (request, sources_used) = match self.prepare(question, chunks)? {
            Prepared::NoContext => {
                return Ok(StreamingAnswer {
                    sources_used: Vec::new(),
                    model: self.settings.model.clone(),
                    fragments: stream::once(async { Ok(NO_CONTEXT_ANSWER.to_string()) }).boxed(),
                });
            }
            Prepared::Ready {
                request,
                sources_used,
            } => (request, sources_used),
        };

        let request = request.with_streaming();
        let upstream = self
            .settings
            .retry
            .run(|_| self.client.stream(&request))
            .await?;

        let fragments = upstream
            .scan(false, |failed, item| {
                let next = if *failed {
                    None
                } else {
                    *failed = item.is_err();
                    Some(item)
                };
                futures::future::ready(next)
            })
            .filter_map(|item| {
                futures::future::ready(match item {
                    Ok(chunk) if chunk.content.is_empty() => None,
                    Ok(chunk) => Some(Ok(chunk.content)),
                    Err(e) => {
                        tracing::error!(error = %e, "Answer stream failed");
                        Some(Err(AppError::Generation(into_failure(e))))
                    }
                })
            })
            .boxed();

        Ok(StreamingAnswer {
            sources_used,
            model: self.settings.model.clone(),
            fragments,
        })
    }

    fn prepare(&self, question: &str, chunks: &[String]) -> AppResult<Prepared> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        let prefix: String = question.chars().take(QUESTION_LOG_PREFIX).collect();
        tracing::info!(question = %prefix, chunks = chunks.len(), "Generating answer");

        // Keep each surviving chunk's position in the caller's list.
        let (positions, texts): (Vec<usize>, Vec<&str>) = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.trim()))
            .filter(|(_, c)| !c.is_empty())
            .unzip();

        if texts.is_empty() {
            return Ok(Prepared::NoContext);
        }

        let assembled = self.assembler.assemble(
            &texts,
            self.settings.max_context_tokens,
            self.tokenizer.as_ref(),
        );
        let sources_used: Vec<usize> = assembled
            .used_indices
            .iter()
            .map(|&i| positions[i])
            .collect();

        let system = build_system_prompt(self.settings.include_citations);
        let user = build_user_prompt(&assembled.context, question);

        tracing::debug!(
            context_tokens = assembled.tokens,
            truncated = assembled.truncated,
            chunks_used = sources_used.len(),
            chunks_dropped = texts.len() - sources_used.len(),
            "Assembled context"
        );
        tracing::info!(
            estimated_prompt_tokens = self.tokenizer.count(&system) + self.tokenizer.count(&user),
            model = %self.settings.model,
            "Calling generative model"
        );

        let request = LlmRequest::new(user, &self.settings.model)
            .with_system(system)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens)
            .with_penalties(0.0, 0.0);

        Ok(Prepared::Ready {
            request,
            sources_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::Confidence;
    use crate::tokenizer::WhitespaceTokenizer;
    use orgmem_core::{GenerationFailure, ProviderError};
    use orgmem_llm::{LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted outcomes and records every request it receives.
    struct ScriptedClient {
        outcomes: Mutex<VecDeque<AppResult<String>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(outcomes: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
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
                usage: LlmUsage::new(40, 10),
            })
        }

        async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
            let content = self.next(request)?;
            let chunks: Vec<AppResult<LlmStreamChunk>> = content
                .split_inclusive(' ')
                .map(|word| {
                    Ok(LlmStreamChunk {
                        content: word.to_string(),
                        done: false,
                        usage: None,
                    })
                })
                .chain(std::iter::once(Err(AppError::from(
                    ProviderError::Transport("connection reset".into()),
                ))))
                .chain(std::iter::once(Ok(LlmStreamChunk {
                    content: "never seen".into(),
                    done: true,
                    usage: None,
                })))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    fn generator(client: Arc<ScriptedClient>, settings: GenerationSettings) -> AnswerGenerator {
        AnswerGenerator::new(client, Arc::new(WhitespaceTokenizer), settings)
    }

    fn fast_settings() -> GenerationSettings {
        GenerationSettings {
            retry: RetryPolicy::new(3)
                .with_delays(Duration::from_millis(1), Duration::from_millis(2)),
            ..GenerationSettings::default()
        }
    }

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let client = ScriptedClient::new(vec![]);
        let err = generator(client.clone(), fast_settings())
            .generate("   ", &chunks(&["text"]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "EMPTY_QUESTION");
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_context_skips_model() {
        let client = ScriptedClient::new(vec![]);
        let gen = generator(client.clone(), fast_settings());

        for input in [chunks(&[]), chunks(&["", "   \n"])] {
            let response = gen.generate("What is the policy?", &input).await.unwrap();
            assert_eq!(response.answer, NO_CONTEXT_ANSWER);
            assert_eq!(response.confidence, Confidence::None);
            assert_eq!(response.tokens_used, TokenUsage::default());
            assert!(response.sources_used.is_empty());
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_success() {
        let client = ScriptedClient::new(vec![Ok("The office opens at 9 [Source 1].".into())]);
        let response = generator(client.clone(), fast_settings())
            .generate("When does the office open?", &chunks(&["The office opens at 9."]))
            .await
            .unwrap();

        assert_eq!(response.confidence, Confidence::High);
        assert_eq!(response.sources_used, vec![0]);
        assert_eq!(response.tokens_used.total, 50);
        assert_eq!(response.model, "gpt-4o-mini");

        let request = client.requests.lock().unwrap()[0].clone();
        assert!(request.prompt.contains("[Source 1]\nThe office opens at 9."));
        assert!(request.prompt.contains("Question: When does the office open?"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.presence_penalty, Some(0.0));
        assert!(request.system.is_some());
    }

    #[tokio::test]
    async fn test_sources_used_refer_to_caller_positions() {
        let client = ScriptedClient::new(vec![Ok("answer".into())]);
        let response = generator(client, fast_settings())
            .generate("q?", &chunks(&["  ", "first", "", "second"]))
            .await
            .unwrap();

        assert_eq!(response.sources_used, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_budget_limits_sources() {
        let a = vec!["a"; 60].join(" ");
        let b = vec!["b"; 60].join(" ");
        let client = ScriptedClient::new(vec![Ok("answer".into())]);
        let settings = GenerationSettings {
            max_context_tokens: 100,
            ..fast_settings()
        };

        let response = generator(client, settings)
            .generate("q?", &[a, b])
            .await
            .unwrap();
        assert_eq!(response.sources_used, vec![0]);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let client = ScriptedClient::new(vec![
            Err(ProviderError::RateLimited("429".into()).into()),
            Err(ProviderError::Timeout("timeout".into()).into()),
            Ok("It might be so.".into()),
        ]);
        let response = generator(client.clone(), fast_settings())
            .generate("q?", &chunks(&["ctx"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        assert_eq!(response.confidence, Confidence::MediumHigh);
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_service_busy() {
        let client = ScriptedClient::new(vec![
            Err(ProviderError::RateLimited("429".into()).into()),
            Err(ProviderError::RateLimited("429".into()).into()),
            Err(ProviderError::RateLimited("429".into()).into()),
            Ok("too late".into()),
        ]);
        let err = generator(client.clone(), fast_settings())
            .generate("q?", &chunks(&["ctx"]))
            .await
            .unwrap_err();

        assert_eq!(client.calls(), 3);
        assert_eq!(err.code(), "SERVICE_BUSY");
        assert!(matches!(
            err,
            AppError::Generation(GenerationFailure::Overloaded { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let client = ScriptedClient::new(vec![Err(ProviderError::Api {
            status: 401,
            message: "invalid key".into(),
        }
        .into())]);
        let err = generator(client.clone(), fast_settings())
            .generate("q?", &chunks(&["ctx"]))
            .await
            .unwrap_err();

        assert_eq!(client.calls(), 1);
        assert_eq!(err.code(), "ASK_FAILED");
    }

    #[tokio::test]
    async fn test_uncertain_answer_is_low() {
        let client = ScriptedClient::new(vec![Ok(
            "I cannot find that; it may possibly perhaps be elsewhere.".into(),
        )]);
        let response = generator(client, fast_settings())
            .generate("q?", &chunks(&["ctx"]))
            .await
            .unwrap();
        assert_eq!(response.confidence, Confidence::Low);
    }

    #[test]
    fn test_temperature_clamped() {
        let client = ScriptedClient::new(vec![]);
        let settings = GenerationSettings {
            temperature: 1.7,
            ..GenerationSettings::default()
        };
        assert_eq!(generator(client, settings).settings().temperature, 1.0);
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let client = ScriptedClient::new(vec![Ok("Opens at nine".into())]);
        let answer = generator(client.clone(), fast_settings())
            .generate_stream("When?", &chunks(&["", "The office opens at nine."]))
            .await
            .unwrap();

        assert_eq!(answer.sources_used, vec![1]);
        assert_eq!(answer.model, "gpt-4o-mini");

        let items: Vec<AppResult<String>> = answer.fragments.collect().await;
        assert_eq!(items.len(), 4);
        let text: String = items[..3].iter().map(|i| i.as_ref().unwrap().clone()).collect();
        assert_eq!(text, "Opens at nine");
        assert!(items[3].is_err());

        let request = client.requests.lock().unwrap()[0].clone();
        assert!(request.stream);
    }

    #[tokio::test]
    async fn test_stream_open_retried() {
        let client = ScriptedClient::new(vec![
            Err(ProviderError::Timeout("timeout".into()).into()),
            Ok("ok".into()),
        ]);
        let answer = generator(client.clone(), fast_settings())
            .generate_stream("q?", &chunks(&["ctx"]))
            .await
            .unwrap();

        let mut fragments = answer.fragments;
        let first = fragments.next().await;
        assert_eq!(first.map(|r| r.unwrap()), Some("ok".to_string()));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_stream_no_context_single_fragment() {
        let client = ScriptedClient::new(vec![]);
        let answer = generator(client.clone(), fast_settings())
            .generate_stream("q?", &chunks(&[]))
            .await
            .unwrap();

        let items: Vec<AppResult<String>> = answer.fragments.collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), NO_CONTEXT_ANSWER);
        assert_eq!(client.calls(), 0);
    }
}
