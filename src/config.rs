//! TOML configuration for the ingestion pipeline.
//!
//! Every section and key has a default, so an empty file is a valid
//! configuration. Secrets (the index API key) never live here; they are
//! read from the environment, optionally seeded from a `.env` file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::index::Metric;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_docs_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_docs_dir(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_length: default_min_chunk_length(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_min_chunk_length() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_dims")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Region the index is created in. Falls back to `PINECONE_ENVIRONMENT`.
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_controller_url")]
    pub controller_url: String,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            dimension: default_dims(),
            metric: default_metric(),
            environment: None,
            cloud: default_cloud(),
            namespace: String::new(),
            controller_url: default_controller_url(),
            upsert_batch_size: default_upsert_batch_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_index_name() -> String {
    "api-docs".to_string()
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_upsert_batch_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl IndexConfig {
    /// Parsed distance metric. Only valid after [`Config::validate`].
    pub fn metric(&self) -> Result<Metric> {
        self.metric.parse()
    }

    /// Configured region, or `PINECONE_ENVIRONMENT` when unset.
    pub fn resolved_environment(&self) -> Option<String> {
        self.environment
            .clone()
            .or_else(|| std::env::var("PINECONE_ENVIRONMENT").ok())
            .filter(|env| !env.trim().is_empty())
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap > self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must not exceed chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        if self.index.upsert_batch_size == 0 {
            anyhow::bail!("index.upsert_batch_size must be > 0");
        }
        if self.index.name.trim().is_empty() {
            anyhow::bail!("index.name must not be empty");
        }
        if self.index.dimension == 0 {
            anyhow::bail!("index.dimension must be > 0");
        }
        self.index.metric()?;

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled or local.",
                other
            ),
        }

        if self.embedding.is_enabled() && self.embedding.dims != self.index.dimension {
            anyhow::bail!(
                "embedding.dims ({}) must match index.dimension ({})",
                self.embedding.dims,
                self.index.dimension
            );
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
