//! Stats command handler.

use super::print_json;
use clap::Args;
use orgmem_core::AppResult;
use orgmem_knowledge::KnowledgeService;

/// Show index statistics and the ingested documents
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, service: &KnowledgeService) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = service.stats()?;

        if self.json {
            return print_json(&stats);
        }

        println!("Index: {}", stats.index_path.as_deref().unwrap_or("(in memory)"));
        println!("Chunks: {}", stats.chunks_count);
        println!("Dimension: {} ({})", stats.dimension, stats.metric);

        if stats.sources.is_empty() {
            println!("Documents: none");
        } else {
            println!("Documents:");
            for source in &stats.sources {
                println!("- {} ({} chunks)", source.source, source.chunk_count);
            }
        }

        Ok(())
    }
}
