//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Similarity metric, fixed when an index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Inner product over L2-normalized vectors; higher is closer.
    #[default]
    Cosine,
    /// Squared Euclidean distance; lower is closer.
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" | "ip" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("Unknown metric: {}", other)),
        }
    }
}

/// Provider and model that produced the vectors of an index.
///
/// Vectors from different models live in unrelated spaces even when their
/// dimensions agree, so an index records which one it was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub provider: String,
    pub model: String,
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Metadata stored alongside each chunk.
///
/// `source` and `chunk_id` are the fields the query path relies on for
/// attribution; anything else lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating document identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Position of the chunk within its document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<usize>,

    /// Free-form extension fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Metadata for chunk `chunk_id` of `source`.
    pub fn new(source: impl Into<String>, chunk_id: usize) -> Self {
        Self {
            source: Some(source.into()),
            chunk_id: Some(chunk_id),
            extra: serde_json::Map::new(),
        }
    }

    /// Attach an extension field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Chunk text
    pub text: String,

    /// Similarity (cosine) or squared distance (L2)
    pub score: f32,

    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

/// A document known to the index with the number of chunks it contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunk_count: usize,
}

/// Internal chunk candidate before embedding.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub source: String,
    pub position: usize,
    pub text: String,
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Number of documents ingested
    pub sources_count: usize,

    /// Number of chunks added to the index
    pub chunks_count: usize,

    /// Number of files skipped (unreadable or empty)
    pub skipped_count: usize,

    /// Total bytes of extracted text
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored chunks
    pub chunks_count: usize,

    /// Vector dimension
    pub dimension: usize,

    /// Similarity metric
    pub metric: Metric,

    /// Persisted index path (without extension)
    pub index_path: Option<String>,

    /// Documents and their chunk counts
    pub sources: Vec<SourceSummary>,
}
