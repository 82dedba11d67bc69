//! Command handlers for the orgmem CLI.

pub mod ask;
pub mod ingest;
pub mod search;
pub mod stats;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use orgmem_core::{config::AppConfig, AppError, AppResult};
use orgmem_knowledge::{
    create_provider, load_config, KnowledgeService, Providers, TiktokenTokenizer,
};
use orgmem_llm::create_client;
use serde::Serialize;
use std::sync::Arc;

/// Build the process's knowledge service from configuration.
pub fn open_service(config: &AppConfig) -> AppResult<KnowledgeService> {
    let knowledge = load_config(&config.workspace)?;

    let embedding_key = knowledge.embedding_api_key(config.api_key.as_deref());
    let embedder = create_provider(&knowledge.embedding, embedding_key.as_deref())?;

    let provider_config = config.get_provider_config(&config.provider);
    let llm = create_client(
        &config.provider,
        provider_config.and_then(|p| p.endpoint()),
        config.resolve_api_key(&config.provider).as_deref(),
        provider_config.and_then(|p| p.timeout()),
    )?;

    let tokenizer = Arc::new(TiktokenTokenizer::for_model(&config.model)?);

    KnowledgeService::open(
        &config.workspace,
        knowledge,
        &config.model,
        Providers {
            embedder,
            llm,
            tokenizer,
        },
    )
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
