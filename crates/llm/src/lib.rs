//! Generative model integration for orgmem.
//!
//! Provides a provider-agnostic `LlmClient` trait with OpenAI and Ollama
//! implementations. Providers report failures as `ProviderError` so the
//! answer generator can tell rate limits and timeouts from fatal errors.
//!
//! # Example
//! ```no_run
//! use orgmem_llm::{create_client, LlmClient, LlmRequest};
//!
//! # async fn example() -> orgmem_core::AppResult<()> {
//! let client = create_client("ollama", None, None, None)?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod http;
pub mod providers;
pub mod types;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
