//! orgmem CLI
//!
//! Ingest documents, search them, and ask questions answered from them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, SearchCommand, StatsCommand};
use orgmem_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// orgmem - grounded answers from your organization's documents
#[derive(Parser, Debug)]
#[command(name = "orgmem")]
#[command(about = "Grounded question answering over ingested documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ORGMEM_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ORGMEM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "ORGMEM_LOG_JSON")]
    json_logs: bool,

    /// Generative model provider (openai, ollama)
    #[arg(short, long, global = true, env = "ORGMEM_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ORGMEM_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add files or directories to the index
    Ingest(IngestCommand),

    /// Semantic search without answer generation
    Search(SearchCommand),

    /// Ask a question answered from the indexed documents
    Ask(AskCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "ingest",
            Self::Search(_) => "search",
            Self::Ask(_) => "ask",
            Self::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("orgmem CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_orgmem_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    match run(&cli.command, &config).await {
        Ok(()) => {
            tracing::info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(code = e.code(), "Command failed: {}", e);
            eprintln!("error[{}]: {}", e.code(), e.user_message());
            std::process::exit(1);
        }
    }
}

async fn run(command: &Commands, config: &AppConfig) -> AppResult<()> {
    let service = commands::open_service(config)?;

    match command {
        Commands::Ingest(cmd) => cmd.execute(&service).await,
        Commands::Search(cmd) => cmd.execute(&service).await,
        Commands::Ask(cmd) => cmd.execute(&service).await,
        Commands::Stats(cmd) => cmd.execute(&service).await,
    }
}
