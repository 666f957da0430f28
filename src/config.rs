// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for semstore
//!
//! Loads configuration from .semstorerc.toml in current directory or ~/.config/semstore/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::embedding::gemini::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
use crate::embedding::{
    ChunkConfig, CommandProvider, DummyProvider, EmbeddingProvider, GeminiConfig, GeminiProvider,
    HashingProvider, RetryPolicy, TaskType, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_HASHING_DIM,
};
use crate::errors::{Result, StoreError};
use crate::store::{StoreOptions, DEFAULT_LEGAL_K, DEFAULT_SEARCH_K, DEFAULT_THRESHOLD};

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".semstorerc.toml";

/// Overrides `[store] path`.
pub const PATH_ENV: &str = "SEMSTORE_PATH";

/// Overrides `[embeddings] provider`.
pub const PROVIDER_ENV: &str = "SEMSTORE_PROVIDER";

/// Snapshot written when nothing else is configured.
pub const DEFAULT_STORE_PATH: &str = "vector_store.json";

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    #[default]
    Gemini,
    Command,
    Builtin,
    Hashing,
    Dummy,
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "command" => Ok(Self::Command),
            "builtin" => Ok(Self::Builtin),
            "hashing" => Ok(Self::Hashing),
            "dummy" => Ok(Self::Dummy),
            other => Err(StoreError::invalid_config(format!(
                "unknown embedding provider '{}'",
                other
            ))),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Snapshot file path
    pub path: Option<PathBuf>,
}

impl StoreSection {
    /// Get snapshot path (defaults to "vector_store.json")
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of characters per chunk
    pub chunk_size: Option<usize>,
    /// Number of characters shared by consecutive chunks
    pub chunk_overlap: Option<usize>,
}

impl ChunkingConfig {
    /// Get chunk size (defaults to 1000)
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Get chunk overlap (defaults to 200)
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP)
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (gemini, command, builtin, hashing, dummy)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Environment variable holding the Gemini API key
    pub api_key_env: Option<String>,
    /// Gemini API base URL
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Attempts per request, including the first
    pub max_attempts: Option<u32>,
    /// Delay before the first retry, doubled after each attempt
    pub backoff_ms: Option<u64>,
    /// Vector size for the hashing and dummy providers
    pub dimension: Option<usize>,
    /// Task hint used when embedding queries
    pub query_task_type: Option<TaskType>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Gemini)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "models/embedding-001")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL)
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get API key variable name (defaults to "GOOGLE_API_KEY")
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("GOOGLE_API_KEY")
    }

    /// Get endpoint (defaults to the public Gemini v1beta API)
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_GEMINI_ENDPOINT)
    }

    /// Get request timeout (defaults to 30s)
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }

    /// Get retry policy (defaults to 3 attempts, 500ms initial backoff)
    pub fn retry(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            initial_backoff: self
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(default.initial_backoff),
        }
    }

    /// Get dimension for local providers (defaults to 256)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(DEFAULT_HASHING_DIM)
    }

    /// Get query task type (defaults to retrieval_document)
    pub fn query_task_type(&self) -> TaskType {
        self.query_task_type.unwrap_or_default()
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits returned by a plain search
    pub k: Option<usize>,
    /// Candidates ranked before the legal document filter
    pub legal_k: Option<usize>,
    /// Score gate for find-business and find-risk
    pub threshold: Option<f32>,
}

impl SearchConfig {
    /// Get k (defaults to 3)
    pub fn k(&self) -> usize {
        self.k.unwrap_or(DEFAULT_SEARCH_K)
    }

    /// Get legal k (defaults to 5)
    pub fn legal_k(&self) -> usize {
        self.legal_k.unwrap_or(DEFAULT_LEGAL_K)
    }

    /// Get threshold (defaults to 0.8)
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }
}

/// Configuration loaded from .semstorerc.toml or ~/.config/semstore/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration
    pub store: StoreSection,

    /// Chunking configuration
    pub chunking: ChunkingConfig,

    /// Embedding configuration
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    pub search: SearchConfig,

    /// File this configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from files, then apply environment overrides
    ///
    /// Precedence (highest to lowest):
    /// 1. SEMSTORE_PATH / SEMSTORE_PROVIDER
    /// 2. .semstorerc.toml in current directory
    /// 3. ~/.config/semstore/config.toml
    pub fn load() -> Result<Self> {
        let mut config = Self::load_files();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_files() -> Self {
        // Try current directory first
        if let Some(config) = Self::load_from_path(Path::new(LOCAL_CONFIG_FILE)) {
            return config;
        }

        // Try home directory config
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("semstore").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Reads one config file. Missing or unparseable files yield `None`.
    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&content) {
            Ok(mut config) => {
                debug!(path = %path.display(), "loaded config");
                config.source = Some(path.to_path_buf());
                Some(config)
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Applies `SEMSTORE_PATH` and `SEMSTORE_PROVIDER` through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(provider) = lookup(PROVIDER_ENV).filter(|p| !p.trim().is_empty()) {
            self.embeddings.provider = Some(provider.parse()?);
        }
        Ok(())
    }

    /// Snapshot path, with `cli_value` taking precedence
    pub fn store_path(&self, cli_value: Option<&Path>) -> PathBuf {
        cli_value
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.store.path())
    }

    /// Validated chunking parameters
    pub fn chunk_config(&self) -> Result<ChunkConfig> {
        ChunkConfig::new(self.chunking.chunk_size(), self.chunking.chunk_overlap())
    }

    /// Options for [`crate::store::SemanticStore::open_with`]
    pub fn store_options(&self) -> Result<StoreOptions> {
        Ok(StoreOptions {
            chunk: self.chunk_config()?,
            query_task: self.embeddings.query_task_type(),
            ..Default::default()
        })
    }

    /// Builds the configured embedding provider.
    ///
    /// The Gemini API key is read here, once, from the variable named by
    /// `api_key_env`.
    pub fn build_provider(&self) -> Result<Box<dyn EmbeddingProvider>> {
        self.build_provider_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::build_provider`] with an explicit environment lookup.
    pub fn build_provider_with<F>(&self, lookup: F) -> Result<Box<dyn EmbeddingProvider>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let embeddings = &self.embeddings;
        match embeddings.provider() {
            EmbeddingProviderType::Gemini => {
                let key_env = embeddings.api_key_env();
                let api_key = lookup(key_env)
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        StoreError::invalid_config(format!(
                            "{} is not set; export it or choose another [embeddings] provider",
                            key_env
                        ))
                    })?;
                let config = GeminiConfig {
                    api_key,
                    model: embeddings.model().to_string(),
                    endpoint: embeddings.endpoint().to_string(),
                    timeout: embeddings.timeout(),
                    retry: embeddings.retry(),
                };
                let provider = GeminiProvider::new(config)
                    .map_err(|e| StoreError::invalid_config(format!("{:#}", e)))?;
                Ok(Box::new(provider))
            }
            EmbeddingProviderType::Command => Ok(Box::new(CommandProvider::new(
                embeddings.command().to_string(),
                embeddings.model().to_string(),
            ))),
            EmbeddingProviderType::Builtin => build_builtin(),
            EmbeddingProviderType::Hashing => {
                Ok(Box::new(HashingProvider::new(non_zero_dimension(embeddings)?)))
            }
            EmbeddingProviderType::Dummy => {
                Ok(Box::new(DummyProvider::new(non_zero_dimension(embeddings)?)))
            }
        }
    }
}

fn non_zero_dimension(embeddings: &EmbeddingConfig) -> Result<usize> {
    match embeddings.dimension() {
        0 => Err(StoreError::invalid_config("dimension must be greater than 0")),
        dim => Ok(dim),
    }
}

#[cfg(feature = "builtin")]
fn build_builtin() -> Result<Box<dyn EmbeddingProvider>> {
    let embedder = crate::embedding::FastEmbedder::new()
        .map_err(|e| StoreError::invalid_config(format!("{:#}", e)))?;
    Ok(Box::new(embedder))
}

#[cfg(not(feature = "builtin"))]
fn build_builtin() -> Result<Box<dyn EmbeddingProvider>> {
    Err(StoreError::invalid_config(
        "the builtin provider requires building with --features builtin",
    ))
}

/// Effective settings, as printed by `semstore config`.
#[derive(Debug, Serialize)]
pub struct ResolvedConfig {
    pub source: Option<PathBuf>,
    pub store_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub provider: EmbeddingProviderType,
    pub model: String,
    pub query_task_type: String,
    pub k: usize,
    pub legal_k: usize,
    pub threshold: f32,
}

impl Config {
    pub fn resolved(&self, cli_store: Option<&Path>) -> ResolvedConfig {
        ResolvedConfig {
            source: self.source.clone(),
            store_path: self.store_path(cli_store),
            chunk_size: self.chunking.chunk_size(),
            chunk_overlap: self.chunking.chunk_overlap(),
            provider: self.embeddings.provider(),
            model: self.embeddings.model().to_string(),
            query_task_type: self.embeddings.query_task_type().to_string(),
            k: self.search.k(),
            legal_k: self.search.legal_k(),
            threshold: self.search.threshold(),
        }
    }
}
