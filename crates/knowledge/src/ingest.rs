//! Document ingestion: extract, chunk, embed, index.

use crate::chunker;
use crate::config::ChunkingConfig;
use crate::embeddings::{embed_texts, EmbeddingProvider};
use crate::parser::{self, ContentType};
use crate::types::{ChunkMetadata, IngestStats};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use orgmem_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// What to ingest and how to split it.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Files or directories; directories are walked recursively
    pub paths: Vec<PathBuf>,

    /// Substrings a path must contain (any); empty means everything
    pub include: Vec<String>,

    /// Substrings that exclude a path
    pub exclude: Vec<String>,

    pub chunking: ChunkingConfig,

    pub batch_size: usize,
}

/// Ingest every file under `options.paths` into `index`.
///
/// Files that cannot be read as text are skipped and counted. Embedding and
/// index failures abort the run; chunks added before the failure stay.
pub async fn ingest_paths(
    index: &VectorIndex,
    embedder: &dyn EmbeddingProvider,
    options: &IngestOptions,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();

    for file in collect_files(options) {
        let text = match parser::parse_file(&file) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
                stats.skipped_count += 1;
                continue;
            }
        };

        let source = source_name(&file);
        let bytes = text.len() as u64;
        let chunks = ingest_text(
            index,
            embedder,
            &source,
            &text,
            ContentType::from_path(&file),
            &options.chunking,
            options.batch_size,
        )
        .await?;

        if chunks == 0 {
            stats.skipped_count += 1;
            continue;
        }

        stats.sources_count += 1;
        stats.chunks_count += chunks;
        stats.bytes_processed += bytes;
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingest completed: {} sources, {} chunks, {} skipped, {} bytes in {:.2}s",
        stats.sources_count,
        stats.chunks_count,
        stats.skipped_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Chunk, embed and index one document's text. Returns the chunk count.
pub async fn ingest_text(
    index: &VectorIndex,
    embedder: &dyn EmbeddingProvider,
    source: &str,
    text: &str,
    content_type: ContentType,
    chunking: &ChunkingConfig,
    batch_size: usize,
) -> AppResult<usize> {
    let candidates = chunker::chunk_text(source, text, chunking.chunk_size, chunking.chunk_overlap);
    if candidates.is_empty() {
        tracing::debug!("No text to index in {}", source);
        return Ok(0);
    }

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_texts(embedder, &texts, batch_size).await?;

    if embeddings.len() != texts.len() {
        return Err(AppError::Knowledge(format!(
            "Embedded {} of {} chunks for {}",
            embeddings.len(),
            texts.len(),
            source
        )));
    }

    let indexed_at = Utc::now().to_rfc3339();
    let metadata = candidates
        .iter()
        .map(|c| {
            ChunkMetadata::new(&c.source, c.position)
                .with_extra("indexed_at", indexed_at.clone())
                .with_extra("content_type", content_type.as_str())
        })
        .collect();

    let added = index.add(embeddings, texts, Some(metadata))?;

    tracing::info!("Indexed {} chunks for {}", added, source);
    Ok(added)
}

/// Files to ingest, in walk order. Hidden entries are never descended into.
fn collect_files(options: &IngestOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in &options.paths {
        if path.is_file() {
            if should_include(path, options) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            let walker = WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
                .filter_map(|e| e.ok());

            for entry in walker {
                if entry.file_type().is_file() && should_include(entry.path(), options) {
                    files.push(entry.into_path());
                }
            }
        } else {
            tracing::warn!("Path does not exist: {:?}", path);
        }
    }

    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Check if a file should be included based on patterns.
fn should_include(path: &Path, options: &IngestOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

/// Document identifier recorded as chunk `source`: the file name.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
