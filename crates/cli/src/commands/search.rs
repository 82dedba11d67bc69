//! Search command handler.

use super::print_json;
use clap::Args;
use orgmem_core::AppResult;
use orgmem_knowledge::rag::types::{truncate_snippet, MAX_SNIPPET_LENGTH};
use orgmem_knowledge::KnowledgeService;

/// Semantic search over indexed chunks, without answer generation
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to return (default: retrieval.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, service: &KnowledgeService) -> AppResult<()> {
        tracing::info!("Executing search command");

        let results = service.search(&self.query, self.top_k).await?;

        if self.json {
            return print_json(&results);
        }

        if results.is_empty() {
            println!("No results.");
            return Ok(());
        }

        for (i, result) in results.iter().enumerate() {
            let source = result.metadata.source.as_deref().unwrap_or("unknown");
            let chunk = result
                .metadata
                .chunk_id
                .map(|c| format!("#{}", c))
                .unwrap_or_default();
            println!("{}. {}{} (score {:.3})", i + 1, source, chunk, result.score);
            println!("   {}", truncate_snippet(&result.text, MAX_SNIPPET_LENGTH));
        }

        Ok(())
    }
}
