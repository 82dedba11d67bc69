//! Ask command handler.
//!
//! Answers a question from the indexed documents, optionally streaming.

use super::print_json;
use clap::Args;
use futures::StreamExt;
use orgmem_core::AppResult;
use orgmem_knowledge::{KnowledgeService, SourceRef};
use std::io::Write;

/// Ask a question answered from the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Print the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, service: &KnowledgeService) -> AppResult<()> {
        tracing::info!("Executing ask command");

        if self.stream {
            return self.handle_streaming(service).await;
        }

        let result = service.ask(&self.question).await?;

        if self.json {
            return print_json(&result);
        }

        println!("{}", result.response.answer);
        println!();
        println!("Confidence: {}", result.response.confidence);
        print_sources(&result.sources);

        tracing::debug!(
            "Token usage - Prompt: {}, Completion: {}, Total: {}",
            result.response.tokens_used.prompt,
            result.response.tokens_used.completion,
            result.response.tokens_used.total
        );

        Ok(())
    }

    async fn handle_streaming(&self, service: &KnowledgeService) -> AppResult<()> {
        let mut stream = service.ask_stream(&self.question).await?;
        let mut answer = String::new();

        while let Some(fragment) = stream.answer.fragments.next().await {
            let fragment = fragment?;
            if !self.json {
                print!("{}", fragment);
                std::io::stdout().flush().ok();
            }
            answer.push_str(&fragment);
        }

        if self.json {
            let output = serde_json::json!({
                "answer": answer,
                "sources_used": stream.answer.sources_used,
                "model": stream.answer.model,
                "sources": stream.sources,
            });
            return print_json(&output);
        }

        println!();
        println!();
        print_sources(&stream.sources);
        Ok(())
    }
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        println!("Sources: (no sources available)");
        return;
    }

    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        let name = source.source.as_deref().unwrap_or("unknown");
        match source.chunk_id {
            Some(chunk) => println!("  [{}] {} #{} (score {:.3})", i + 1, name, chunk, source.score),
            None => println!("  [{}] {} (score {:.3})", i + 1, name, source.score),
        }
    }
}
