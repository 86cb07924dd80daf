/// Configuration module for ragpipe.
///
/// Handles loading, validating, and providing default configuration values.
/// Credentials are never stored in the JSON file; they come from environment
/// variables and are checked at client construction, before any network call.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::chunker::{ChunkOptions, DEFAULT_MAX_SIZE, DEFAULT_OVERLAP};

/// Non-retryable configuration failures: missing credentials or invalid
/// values for the selected backend.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set the {0} environment variable")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Vector storage backend, selected once at startup. The two backends are
/// never mixed for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Backend {
    /// Relational store with a vector extension; embeddings live inline.
    #[serde(rename = "sqlite-vec")]
    SqliteVec,
    /// External managed vector index; the relational store keeps metadata
    /// rows only and the authoritative vectors live in the index.
    #[serde(rename = "pinecone")]
    Pinecone,
}

// ── Default value functions ──────────────────────────────────────────

fn default_backend() -> Backend {
    Backend::SqliteVec
}

fn default_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_search_top_k() -> usize {
    8
}

fn default_min_score() -> f32 {
    0.25
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_rerank_model() -> String {
    "gpt-4o-mini".to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub pinecone: PineconeConfig,

    #[serde(default)]
    pub rerank: RerankConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PineconeConfig {
    /// Data-plane host of the managed index, e.g. "https://my-index-abc123.svc.pinecone.io".
    #[serde(default)]
    pub index_host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_rerank_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
            search_top_k: default_search_top_k(),
            min_score: default_min_score(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            pinecone: PineconeConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            overlap: default_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: default_openai_base_url(),
            model: default_rerank_model(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values for the selected backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.max_size == 0 {
            return Err(ConfigError::Invalid("chunking.max_size must be positive".into()));
        }
        if self.chunking.overlap >= self.chunking.max_size {
            return Err(ConfigError::Invalid(
                "chunking.overlap must be smaller than chunking.max_size".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimensions must be positive".into(),
            ));
        }
        if self.search_top_k == 0 {
            return Err(ConfigError::Invalid("search_top_k must be positive".into()));
        }
        if self.backend == Backend::Pinecone && self.pinecone.index_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pinecone.index_host is required for the pinecone backend".into(),
            ));
        }
        Ok(())
    }

    /// Chunker options derived from the config.
    #[must_use]
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_size: self.chunking.max_size,
            overlap: self.chunking.overlap,
        }
    }

    /// Embedding/re-rank provider API key from the environment.
    pub fn openai_api_key() -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("OPENAI_API_KEY"))
    }

    /// External vector index API key from the environment.
    pub fn pinecone_api_key() -> Result<String, ConfigError> {
        std::env::var("PINECONE_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("PINECONE_API_KEY"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
