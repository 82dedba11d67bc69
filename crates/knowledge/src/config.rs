//! Knowledge base configuration management.

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embeddings::EmbeddingConfig;
use crate::types::Metric;
use orgmem_core::config::DEFAULT_API_KEY_ENV;
use orgmem_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one knowledge base, stored at `.orgmem/knowledge.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Artifact stem, relative to the workspace unless absolute
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub metric: Metric,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".orgmem").join("index").join("vectors")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            metric: Metric::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Total model calls per question, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_include_citations")]
    pub include_citations: bool,
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_include_citations() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_attempts: default_max_attempts(),
            include_citations: default_include_citations(),
        }
    }
}

impl KnowledgeConfig {
    /// Reject settings no component can work with.
    pub fn validate(&self) -> AppResult<()> {
        self.embedding.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be at least 1".to_string()));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config("chunking.chunk_size must be at least 1".to_string()));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.generation.max_attempts == 0 {
            return Err(AppError::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Index artifact stem resolved against the workspace.
    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.index.path)
    }

    /// API key for the embedding provider.
    ///
    /// An explicit key wins; otherwise the variable named by `apiKeyEnv`,
    /// falling back to `OPENAI_API_KEY`.
    pub fn embedding_api_key(&self, explicit: Option<&str>) -> Option<String> {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        let env_var = self
            .embedding
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_API_KEY_ENV);
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }
}

/// Load knowledge configuration.
///
/// Reads `.orgmem/knowledge.yaml` if it exists, otherwise returns defaults.
pub fn load_config(workspace: &Path) -> AppResult<KnowledgeConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("Using default knowledge config (no config file found)");
        return Ok(KnowledgeConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Loaded knowledge config from {:?}", config_path);
    Ok(config)
}

/// Save knowledge configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge config to {:?}", config_path);
    Ok(())
}

/// Get the path to the knowledge config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".orgmem").join("knowledge.yaml")
}
