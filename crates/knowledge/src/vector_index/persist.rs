//! On-disk layout of a vector index.
//!
//! An index at `<path>` is stored as two companion files:
//! `<path>.index` (bincode: dimension, metric, flat vector payload) and
//! `<path>.meta` (JSON: texts, metadata, dimension, metric and, when known,
//! the embedding model). Both are
//! rewritten in full through a temporary file and a rename.

use crate::types::{ChunkMetadata, EmbeddingModel, Metric};
use orgmem_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexPayload {
    pub dimension: usize,
    pub metric: Metric,
    pub vectors: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetaPayload {
    pub texts: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub dimension: usize,
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingModel>,
}

/// Which of the two artifacts exist for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Artifacts {
    Both,
    Missing,
    Partial,
}

pub(crate) fn index_file(path: &Path) -> PathBuf {
    with_suffix(path, ".index")
}

pub(crate) fn meta_file(path: &Path) -> PathBuf {
    with_suffix(path, ".meta")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn artifacts(path: &Path) -> Artifacts {
    match (index_file(path).exists(), meta_file(path).exists()) {
        (true, true) => Artifacts::Both,
        (false, false) => Artifacts::Missing,
        _ => Artifacts::Partial,
    }
}

/// Write both artifacts.
pub(crate) fn write(path: &Path, index: &IndexPayload, meta: &MetaPayload) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let index_bytes = bincode::serialize(index)?;
    let meta_bytes = serde_json::to_vec(meta)?;

    write_atomic(&index_file(path), &index_bytes)?;
    write_atomic(&meta_file(path), &meta_bytes)?;

    tracing::debug!(
        path = %path.display(),
        chunks = meta.texts.len(),
        index_bytes = index_bytes.len(),
        meta_bytes = meta_bytes.len(),
        "Persisted vector index"
    );
    Ok(())
}

fn write_atomic(target: &Path, bytes: &[u8]) -> AppResult<()> {
    let tmp = with_suffix(target, ".tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, target)?;
    Ok(())
}

/// Read and cross-check both artifacts.
pub(crate) fn read(path: &Path) -> AppResult<(IndexPayload, MetaPayload)> {
    match artifacts(path) {
        Artifacts::Both => {}
        Artifacts::Partial => {
            return Err(AppError::CorruptState(format!(
                "Only one of {:?} / {:?} exists",
                index_file(path),
                meta_file(path)
            )))
        }
        Artifacts::Missing => {
            return Err(AppError::Knowledge(format!(
                "No index found at {:?}",
                path
            )))
        }
    }

    let index_bytes = fs::read(index_file(path))?;
    let index: IndexPayload = bincode::deserialize(&index_bytes)
        .map_err(|e| AppError::CorruptState(format!("Unreadable index payload: {}", e)))?;

    let meta_bytes = fs::read(meta_file(path))?;
    let meta: MetaPayload = serde_json::from_slice(&meta_bytes)
        .map_err(|e| AppError::CorruptState(format!("Unreadable index metadata: {}", e)))?;

    validate(&index, &meta)?;
    Ok((index, meta))
}

fn validate(index: &IndexPayload, meta: &MetaPayload) -> AppResult<()> {
    if index.dimension == 0 {
        return Err(AppError::CorruptState("Index dimension is zero".to_string()));
    }
    if index.dimension != meta.dimension || index.metric != meta.metric {
        return Err(AppError::CorruptState(format!(
            "Index is {}-d {} but metadata says {}-d {}",
            index.dimension, index.metric, meta.dimension, meta.metric
        )));
    }
    if index.vectors.len() != index.dimension * meta.texts.len() {
        return Err(AppError::CorruptState(format!(
            "{} vector values for {} texts of dimension {}",
            index.vectors.len(),
            meta.texts.len(),
            index.dimension
        )));
    }
    if meta.metadata.len() != meta.texts.len() {
        return Err(AppError::CorruptState(format!(
            "{} metadata records for {} texts",
            meta.metadata.len(),
            meta.texts.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> (IndexPayload, MetaPayload) {
        (
            IndexPayload {
                dimension: 2,
                metric: Metric::L2,
                vectors: vec![1.0, 0.0, 0.0, 1.0],
            },
            MetaPayload {
                texts: vec!["a".into(), "b".into()],
                metadata: vec![ChunkMetadata::default(), ChunkMetadata::new("doc", 1)],
                dimension: 2,
                metric: Metric::L2,
                embedding: None,
            },
        )
    }

    #[test]
    fn test_suffixes_append_to_full_name() {
        let path = Path::new("data/faiss.v1");
        assert_eq!(index_file(path), PathBuf::from("data/faiss.v1.index"));
        assert_eq!(meta_file(path), PathBuf::from("data/faiss.v1.meta"));
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/vectors");
        let (index, meta) = sample();

        write(&path, &index, &meta).unwrap();
        assert_eq!(artifacts(&path), Artifacts::Both);
        assert!(!with_suffix(&index_file(&path), ".tmp").exists());

        let (index, meta) = read(&path).unwrap();
        assert_eq!(index.vectors, vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(meta.metadata[1].source.as_deref(), Some("doc"));
        assert!(meta.embedding.is_none());
    }

    #[test]
    fn test_embedding_model_round_trips_in_meta() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");
        let (index, mut meta) = sample();
        meta.embedding = Some(EmbeddingModel {
            provider: "ollama".into(),
            model: "nomic-embed-text".into(),
        });
        write(&path, &index, &meta).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(meta_file(&path)).unwrap()).unwrap();
        assert_eq!(raw["embedding"]["model"], "nomic-embed-text");

        let (_, meta) = read(&path).unwrap();
        assert_eq!(meta.embedding.map(|e| e.provider), Some("ollama".to_string()));
    }

    #[test]
    fn test_partial_artifacts_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");
        let (index, meta) = sample();
        write(&path, &index, &meta).unwrap();
        fs::remove_file(meta_file(&path)).unwrap();

        let err = read(&path).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STATE");
    }

    #[test]
    fn test_inconsistent_lengths_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");
        let (mut index, meta) = sample();
        index.vectors.pop();
        write(&path, &index, &meta).unwrap();

        assert_eq!(read(&path).unwrap_err().code(), "CORRUPT_STATE");
    }

    #[test]
    fn test_metric_disagreement_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors");
        let (index, mut meta) = sample();
        meta.metric = Metric::Cosine;
        write(&path, &index, &meta).unwrap();

        assert_eq!(read(&path).unwrap_err().code(), "CORRUPT_STATE");
    }
}
