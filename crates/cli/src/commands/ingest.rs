//! Ingest command handler.

use super::print_json;
use clap::Args;
use orgmem_core::AppResult;
use orgmem_knowledge::{IngestOptions, KnowledgeService};
use std::path::PathBuf;

/// Add documents to the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only ingest paths containing one of these substrings
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing any of these substrings
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, service: &KnowledgeService) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} paths", self.paths.len());

        let config = service.config();
        let options = IngestOptions {
            paths: self.paths.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
        };

        let stats = service.ingest_with(&options).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Ingested {} sources ({} chunks, {} bytes) in {:.2}s",
                stats.sources_count, stats.chunks_count, stats.bytes_processed, stats.duration_secs
            );
            if stats.skipped_count > 0 {
                println!("Skipped {} files", stats.skipped_count);
            }
        }

        Ok(())
    }
}
