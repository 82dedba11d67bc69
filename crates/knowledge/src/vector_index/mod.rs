//! Flat in-memory vector index with durable persistence.
//!
//! Stores chunk embeddings, texts and metadata as three parallel collections
//! and answers nearest-neighbor queries by exhaustive scan. Position `i`
//! always refers to the same (embedding, text, metadata) triple; the index
//! only grows.
//!
//! All state sits behind one `RwLock`. `add` holds the write guard across
//! normalize, append and persist; `search` takes the read guard. No method
//! is async, so no guard is ever held across an await point.

mod persist;

use crate::types::{ChunkMetadata, EmbeddingModel, Metric, RetrievalResult, SourceSummary};
use orgmem_core::{AppError, AppResult};
use persist::{Artifacts, IndexPayload, MetaPayload};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct IndexState {
    /// Row-major `len * dimension` vector payload
    vectors: Vec<f32>,
    texts: Vec<String>,
    metadata: Vec<ChunkMetadata>,
}

/// Exact nearest-neighbor index over fixed-dimension vectors.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    embedding: Option<EmbeddingModel>,
    path: Option<PathBuf>,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty in-memory index.
    pub fn new(dimension: usize, metric: Metric) -> AppResult<Self> {
        if dimension == 0 {
            return Err(AppError::DimensionMismatch(
                "Index dimension must be positive".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            metric,
            embedding: None,
            path: None,
            state: RwLock::new(IndexState::default()),
        })
    }

    /// Open the index persisted at `path`, or start an empty one bound to it.
    ///
    /// Every successful `add` rewrites the artifacts at `path`. Fails with
    /// `CorruptState` if stored artifacts disagree with `dimension`/`metric`.
    pub fn open(dimension: usize, metric: Metric, path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        if persist::artifacts(&path) == Artifacts::Missing {
            tracing::info!(path = %path.display(), dimension, %metric, "Starting empty vector index");
            let mut index = Self::new(dimension, metric)?;
            index.path = Some(path);
            return Ok(index);
        }

        let index = Self::load(&path)?;
        if index.dimension != dimension || index.metric != metric {
            return Err(AppError::CorruptState(format!(
                "Stored index is {}-d {} but {}-d {} was configured",
                index.dimension, index.metric, dimension, metric
            )));
        }
        Ok(index)
    }

    /// Load an index from its two artifacts at `path`.
    ///
    /// The loaded index stays bound to `path` for subsequent persists.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let (index, meta) = persist::read(path)?;

        tracing::info!(
            path = %path.display(),
            chunks = meta.texts.len(),
            dimension = index.dimension,
            metric = %index.metric,
            "Loaded vector index"
        );

        Ok(Self {
            dimension: index.dimension,
            metric: index.metric,
            embedding: meta.embedding,
            path: Some(path.to_path_buf()),
            state: RwLock::new(IndexState {
                vectors: index.vectors,
                texts: meta.texts,
                metadata: meta.metadata,
            }),
        })
    }

    /// Append embeddings with their texts and optional metadata.
    ///
    /// Returns the number of stored chunks after the append. When the index
    /// is bound to a path the artifacts are rewritten before returning; a
    /// persist failure is reported but the in-memory append stands.
    pub fn add(
        &self,
        mut embeddings: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadata: Option<Vec<ChunkMetadata>>,
    ) -> AppResult<usize> {
        if embeddings.len() != texts.len() {
            return Err(AppError::DimensionMismatch(format!(
                "{} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        if let Some(ref metadata) = metadata {
            if metadata.len() != texts.len() {
                return Err(AppError::DimensionMismatch(format!(
                    "{} metadata records for {} texts",
                    metadata.len(),
                    texts.len()
                )));
            }
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(AppError::DimensionMismatch(format!(
                "Embedding has {} values, index expects {}",
                bad.len(),
                self.dimension
            )));
        }
        if embeddings.iter().flatten().any(|x| !x.is_finite()) {
            return Err(AppError::DimensionMismatch(
                "Embedding contains NaN or infinite values".to_string(),
            ));
        }

        let metadata = metadata.unwrap_or_else(|| vec![ChunkMetadata::default(); texts.len()]);
        let added = texts.len();

        let mut state = self.write_state()?;

        if self.metric == Metric::Cosine {
            embeddings.iter_mut().for_each(|e| normalize(e));
        }

        state.vectors.reserve(added * self.dimension);
        for embedding in &embeddings {
            state.vectors.extend_from_slice(embedding);
        }
        state.texts.extend(texts);
        state.metadata.extend(metadata);

        let total = state.texts.len();
        tracing::debug!(added, total, "Added chunks to vector index");

        if let Some(ref path) = self.path {
            self.persist(&state, path)?;
        }

        Ok(total)
    }

    /// Return up to `k` nearest chunks to `query`, best first.
    ///
    /// Cosine results are ordered by descending similarity, L2 results by
    /// ascending squared distance.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<RetrievalResult>> {
        if query.len() != self.dimension {
            return Err(AppError::DimensionMismatch(format!(
                "Query has {} values, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let state = self.read_state()?;
        if k == 0 || state.texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        if self.metric == Metric::Cosine {
            normalize(&mut query);
        }

        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| {
                let score = match self.metric {
                    Metric::Cosine => dot(row, &query),
                    Metric::L2 => squared_distance(row, &query),
                };
                (i, score)
            })
            .collect();

        match self.metric {
            Metric::Cosine => scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))),
            Metric::L2 => scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))),
        }
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievalResult {
                text: state.texts[i].clone(),
                score,
                metadata: state.metadata[i].clone(),
            })
            .collect())
    }

    /// Write the index to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        // Exclusive so a concurrent add cannot interleave with the rewrite.
        let state = self.write_state()?;
        self.persist(&state, path.as_ref())
    }

    /// Number of stored chunks.
    pub fn len(&self) -> AppResult<usize> {
        Ok(self.read_state()?.texts.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Embedding model the stored vectors came from, if recorded.
    pub fn embedding_model(&self) -> Option<&EmbeddingModel> {
        self.embedding.as_ref()
    }

    /// Record the embedding model; written with the next persist.
    pub fn set_embedding_model(&mut self, model: EmbeddingModel) {
        self.embedding = Some(model);
    }

    /// Path the index persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Distinct `source` values with their chunk counts, sorted by name.
    pub fn sources(&self) -> AppResult<Vec<SourceSummary>> {
        let state = self.read_state()?;

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for source in state.metadata.iter().filter_map(|m| m.source.as_deref()) {
            *counts.entry(source).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(source, chunk_count)| SourceSummary {
                source: source.to_string(),
                chunk_count,
            })
            .collect())
    }

    fn persist(&self, state: &IndexState, path: &Path) -> AppResult<()> {
        let index = IndexPayload {
            dimension: self.dimension,
            metric: self.metric,
            vectors: state.vectors.clone(),
        };
        let meta = MetaPayload {
            texts: state.texts.clone(),
            metadata: state.metadata.clone(),
            dimension: self.dimension,
            metric: self.metric,
            embedding: self.embedding.clone(),
        };

        persist::write(path, &index, &meta).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to persist vector index");
        })
    }

    fn read_state(&self) -> AppResult<RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|_| AppError::Knowledge("Vector index lock poisoned".to_string()))
    }

    fn write_state(&self) -> AppResult<RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|_| AppError::Knowledge("Vector index lock poisoned".to_string()))
    }
}

/// Scale `v` to unit length. Zero vectors are left as they are.
fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_len_accumulates_across_adds() {
        let index = VectorIndex::new(3, Metric::Cosine).unwrap();
        assert!(index.is_empty().unwrap());

        index
            .add(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]], texts(&["a", "b"]), None)
            .unwrap();
        let total = index
            .add(vec![vec![0.0, 0.0, 1.0]], texts(&["c"]), None)
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(index.len().unwrap(), 3);
    }

    #[test]
    fn test_add_rejects_mismatches() {
        let index = VectorIndex::new(2, Metric::Cosine).unwrap();

        let wrong_dim = index.add(vec![vec![1.0, 0.0, 0.0]], texts(&["a"]), None);
        assert_eq!(wrong_dim.unwrap_err().code(), "DIMENSION_MISMATCH");

        let wrong_count = index.add(vec![vec![1.0, 0.0]], texts(&["a", "b"]), None);
        assert_eq!(wrong_count.unwrap_err().code(), "DIMENSION_MISMATCH");

        let wrong_meta = index.add(
            vec![vec![1.0, 0.0]],
            texts(&["a"]),
            Some(vec![ChunkMetadata::default(), ChunkMetadata::default()]),
        );
        assert_eq!(wrong_meta.unwrap_err().code(), "DIMENSION_MISMATCH");

        assert_eq!(index.len().unwrap(), 0);
    }

    #[test]
    fn test_add_rejects_non_finite_values() {
        let index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index.add(vec![vec![1.0, 0.0]], texts(&["ok"]), None).unwrap();

        let nan = index.add(vec![vec![f32::NAN, 1.0]], texts(&["nan"]), None);
        assert_eq!(nan.unwrap_err().code(), "DIMENSION_MISMATCH");
        let inf = index.add(
            vec![vec![0.0, 1.0], vec![f32::INFINITY, 0.0]],
            texts(&["fine", "inf"]),
            None,
        );
        assert_eq!(inf.unwrap_err().code(), "DIMENSION_MISMATCH");

        assert_eq!(index.len().unwrap(), 1);
        let results = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score <= 1.0 + 1e-5);
    }

    #[test]
    fn test_embedding_model_persists_with_index() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");

        let mut index = VectorIndex::open(2, Metric::Cosine, &path).unwrap();
        assert!(index.embedding_model().is_none());
        index.set_embedding_model(EmbeddingModel {
            provider: "mock".into(),
            model: "trigram-v1".into(),
        });
        index.add(vec![vec![1.0, 0.0]], texts(&["a"]), None).unwrap();

        let reopened = VectorIndex::open(2, Metric::Cosine, &path).unwrap();
        assert_eq!(
            reopened.embedding_model().map(|m| m.to_string()),
            Some("mock/trigram-v1".to_string())
        );
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(VectorIndex::new(0, Metric::L2).is_err());
    }

    #[test]
    fn test_cosine_scores_bounded_and_ordered() {
        let index = VectorIndex::new(3, Metric::Cosine).unwrap();
        index
            .add(
                vec![
                    vec![3.0, 0.0, 0.0],
                    vec![1.0, 1.0, 0.0],
                    vec![-2.0, 0.5, 0.0],
                    vec![0.0, 0.0, 7.0],
                ],
                texts(&["x", "xy", "neg", "z"]),
                None,
            )
            .unwrap();

        let results = index.search(&[10.0, 0.0, 0.0], 4).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].text, "x");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].text, "xy");

        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for result in &results {
            assert!(result.score <= 1.0 + 1e-5 && result.score >= -1.0 - 1e-5);
        }
    }

    #[test]
    fn test_l2_ascending_distance() {
        let index = VectorIndex::new(2, Metric::L2).unwrap();
        index
            .add(
                vec![vec![5.0, 5.0], vec![1.0, 1.0], vec![0.0, 0.0]],
                texts(&["far", "near", "origin"]),
                None,
            )
            .unwrap();

        let results = index.search(&[0.5, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "origin");
        assert!((results[0].score - 0.25).abs() < 1e-6);
        assert_eq!(results[1].text, "near");
        assert!((results[1].score - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_fewer_than_k_never_padded() {
        let index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index
            .add(vec![vec![1.0, 0.0], vec![0.0, 1.0]], texts(&["a", "b"]), None)
            .unwrap();

        assert_eq!(index.search(&[1.0, 1.0], 5).unwrap().len(), 2);
        assert!(index.search(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_search() {
        let index = VectorIndex::new(4, Metric::Cosine).unwrap();
        assert!(index.search(&[0.1, 0.2, 0.3, 0.4], 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = VectorIndex::new(4, Metric::Cosine).unwrap();
        let err = index.search(&[0.1, 0.2], 5).unwrap_err();
        assert_eq!(err.code(), "DIMENSION_MISMATCH");
    }

    #[test]
    fn test_metadata_travels_with_results() {
        let index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index
            .add(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                texts(&["a", "b"]),
                Some(vec![ChunkMetadata::new("doc-a", 0), ChunkMetadata::new("doc-b", 0)]),
            )
            .unwrap();

        let results = index.search(&[0.0, 2.0], 1).unwrap();
        assert_eq!(results[0].metadata.source.as_deref(), Some("doc-b"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");

        let index = VectorIndex::new(3, Metric::Cosine).unwrap();
        index
            .add(
                vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0], vec![0.0, 1.0, 0.0]],
                texts(&["first", "second", "third"]),
                Some(vec![
                    ChunkMetadata::new("a.md", 0),
                    ChunkMetadata::new("a.md", 1),
                    ChunkMetadata::new("b.md", 0),
                ]),
            )
            .unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len().unwrap(), 3);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.metric(), Metric::Cosine);

        let query = [1.0, 1.5, 2.0];
        let before = index.search(&query, 3).unwrap();
        let after = loaded.search(&query, 3).unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.text, a.text);
            assert_eq!(b.metadata, a.metadata);
            assert!((b.score - a.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_open_persists_on_add_and_rehydrates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index/vectors");

        let index = VectorIndex::open(2, Metric::Cosine, &path).unwrap();
        assert!(index.is_empty().unwrap());
        assert_eq!(index.path(), Some(path.as_path()));
        index
            .add(
                vec![vec![1.0, 0.0]],
                texts(&["persisted"]),
                Some(vec![ChunkMetadata::new("notes.txt", 0)]),
            )
            .unwrap();

        let reopened = VectorIndex::open(2, Metric::Cosine, &path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(reopened.search(&[1.0, 0.0], 1).unwrap()[0].text, "persisted");
    }

    #[test]
    fn test_open_rejects_configuration_drift() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");

        let index = VectorIndex::open(2, Metric::Cosine, &path).unwrap();
        index.add(vec![vec![1.0, 0.0]], texts(&["a"]), None).unwrap();

        let err = VectorIndex::open(3, Metric::Cosine, &path).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STATE");
        let err = VectorIndex::open(2, Metric::L2, &path).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STATE");
    }

    #[test]
    fn test_sources_counts_chunks() {
        let index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index
            .add(
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                texts(&["a", "b", "c"]),
                Some(vec![
                    ChunkMetadata::new("policy.md", 0),
                    ChunkMetadata::new("faq.md", 0),
                    ChunkMetadata::new("policy.md", 1),
                ]),
            )
            .unwrap();

        let sources = index.sources().unwrap();
        assert_eq!(
            sources,
            vec![
                SourceSummary {
                    source: "faq.md".into(),
                    chunk_count: 1
                },
                SourceSummary {
                    source: "policy.md".into(),
                    chunk_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        use std::sync::Arc;

        let index = Arc::new(VectorIndex::new(2, Metric::Cosine).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    index
                        .add(vec![vec![1.0, i as f32]], vec![format!("chunk {}", i)], None)
                        .unwrap();
                    index.search(&[1.0, 0.0], 10).unwrap().len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(index.len().unwrap(), 4);
    }
}
