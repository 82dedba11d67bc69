//! End-to-end scenarios through the knowledge service.

use super::support::ScriptedClient;
use crate::config::KnowledgeConfig;
use crate::embeddings::providers::MockProvider;
use crate::embeddings::EmbeddingConfig;
use crate::rag::{Confidence, RetryPolicy};
use crate::service::{KnowledgeService, Providers};
use crate::tokenizer::WhitespaceTokenizer;
use futures::StreamExt;
use orgmem_core::{AppError, GenerationFailure, ProviderError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIMS: usize = 128;

fn config() -> KnowledgeConfig {
    KnowledgeConfig {
        embedding: EmbeddingConfig::mock(DIMS),
        ..Default::default()
    }
}

fn open(workspace: &Path, llm: Arc<ScriptedClient>) -> KnowledgeService {
    let providers = Providers {
        embedder: Arc::new(MockProvider::new(DIMS)),
        llm,
        tokenizer: Arc::new(WhitespaceTokenizer),
    };
    KnowledgeService::open(workspace, config(), "test-model", providers)
        .unwrap()
        .with_retry(
            RetryPolicy::new(3).with_delays(Duration::from_millis(1), Duration::from_millis(2)),
        )
}

fn write_docs(workspace: &Path) {
    let docs = workspace.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("leave.md"),
        "# Leave policy\nEmployees receive twenty five days of annual leave per year.",
    )
    .unwrap();
    fs::write(
        docs.join("parking.txt"),
        "Parking permits are issued by the facilities team on the ground floor.",
    )
    .unwrap();
}

#[tokio::test]
async fn test_ingest_then_ask_attributes_sources() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());
    let llm = ScriptedClient::new(vec![Ok(
        "Employees receive twenty five days of annual leave [Source 1].".to_string(),
    )]);
    let service = open(temp.path(), llm.clone());

    let stats = service.ingest(vec![temp.path().join("docs")]).await.unwrap();
    assert_eq!(stats.sources_count, 2);
    assert_eq!(stats.chunks_count, 2);

    let result = service.ask("How many days of annual leave?").await.unwrap();

    assert_eq!(result.response.confidence, Confidence::High);
    assert_eq!(result.response.model, "test-model");
    assert_eq!(result.response.tokens_used.total, 150);
    assert_eq!(result.sources.len(), result.response.sources_used.len());
    assert_eq!(result.sources[0].source.as_deref(), Some("leave.md"));
    assert_eq!(result.sources[0].chunk_id, Some(0));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("[Source 1]"));
    assert!(requests[0].prompt.contains("Question: How many days of annual leave?"));
}

#[tokio::test]
async fn test_ask_validation_order() {
    let temp = TempDir::new().unwrap();
    let llm = ScriptedClient::new(vec![]);
    let service = open(temp.path(), llm.clone());

    assert!(matches!(service.ask("   ").await, Err(AppError::EmptyQuestion)));
    assert!(matches!(
        service.ask("anything?").await,
        Err(AppError::NoDocumentsIndexed)
    ));
    assert!(llm.requests().is_empty());
}

#[tokio::test]
async fn test_index_survives_reopen() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());

    {
        let service = open(temp.path(), ScriptedClient::new(vec![]));
        service.ingest(vec![temp.path().join("docs")]).await.unwrap();
    }

    let service = open(temp.path(), ScriptedClient::new(vec![]));
    let stats = service.stats().unwrap();
    assert_eq!(stats.chunks_count, 2);
    assert_eq!(stats.dimension, DIMS);

    let sources: Vec<_> = stats.sources.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(sources, vec!["leave.md", "parking.txt"]);

    let hits = service.search("parking permits", Some(1)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.source.as_deref(), Some("parking.txt"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());
    let llm = ScriptedClient::new(vec![
        Err(ProviderError::RateLimited("429".into()).into()),
        Err(ProviderError::Timeout("slow".into()).into()),
        Ok("Twenty five days.".to_string()),
    ]);
    let service = open(temp.path(), llm.clone());
    service.ingest(vec![temp.path().join("docs")]).await.unwrap();

    let result = service.ask("How much leave?").await.unwrap();
    assert_eq!(result.response.answer, "Twenty five days.");
    assert_eq!(llm.requests().len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_report_overloaded() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());
    let llm = ScriptedClient::new(
        (0..3)
            .map(|_| Err(ProviderError::RateLimited("429".into()).into()))
            .collect(),
    );
    let service = open(temp.path(), llm.clone());
    service.ingest(vec![temp.path().join("docs")]).await.unwrap();

    let err = service.ask("How much leave?").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Generation(GenerationFailure::Overloaded { attempts: 3 })
    ));
    assert_eq!(err.code(), "SERVICE_BUSY");
}

#[tokio::test]
async fn test_ask_stream_yields_fragments() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());
    let llm = ScriptedClient::new(vec![Ok("Twenty five days.".to_string())]);
    let service = open(temp.path(), llm.clone());
    service.ingest(vec![temp.path().join("docs")]).await.unwrap();

    let mut stream = service.ask_stream("How much annual leave?").await.unwrap();
    assert!(!stream.sources.is_empty());

    let mut answer = String::new();
    while let Some(fragment) = stream.answer.fragments.next().await {
        answer.push_str(&fragment.unwrap());
    }
    assert_eq!(answer, "Twenty five days.");
    assert!(llm.requests()[0].stream);
}

#[test]
fn test_open_rejects_provider_dimension_drift() {
    let temp = TempDir::new().unwrap();
    let providers = Providers {
        embedder: Arc::new(MockProvider::new(DIMS / 2)),
        llm: ScriptedClient::new(vec![]),
        tokenizer: Arc::new(WhitespaceTokenizer),
    };

    let result = KnowledgeService::open(temp.path(), config(), "m", providers);
    assert!(matches!(result, Err(AppError::DimensionMismatch(_))));
}

#[tokio::test]
async fn test_open_rejects_embedding_model_drift() {
    let temp = TempDir::new().unwrap();
    write_docs(temp.path());
    let service = open(temp.path(), ScriptedClient::new(vec![]));
    service.ingest(vec![temp.path().join("docs")]).await.unwrap();
    drop(service);

    let mut drifted = config();
    drifted.embedding.model = "trigram-v2".to_string();
    let providers = Providers {
        embedder: Arc::new(MockProvider::new(DIMS)),
        llm: ScriptedClient::new(vec![]),
        tokenizer: Arc::new(WhitespaceTokenizer),
    };

    let result = KnowledgeService::open(temp.path(), drifted, "test-model", providers);
    match result {
        Err(AppError::Config(message)) => assert!(message.contains("trigram-v1")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("drifted embedding model was accepted"),
    }

    // The recorded model still opens cleanly.
    let reopened = open(temp.path(), ScriptedClient::new(vec![]));
    assert_eq!(reopened.stats().unwrap().chunks_count, 2);
}
