//! Configuration loading and validation.
//!
//! GitSage reads a single TOML file (default `./config/gitsage.toml`). Only
//! `[db]` is required; every other section has defaults.
//!
//! ```toml
//! [db]
//! path = "./data/gitsage.sqlite"
//!
//! [embedding.code]
//! provider = "hashing"
//! dims = 256
//!
//! [embedding.text]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generation]
//! provider = "openai"
//! model = "llama-3.1-8b-instant"
//! url = "https://api.groq.com/openai/v1/chat/completions"
//! api_key_env = "GROQ_API_KEY"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gitsage_core::chunk::ChunkingParams;
use gitsage_core::filter::FilterLimits;
use gitsage_core::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_max_doc_bytes")]
    pub max_doc_bytes: u64,
    #[serde(default = "default_max_config_bytes")]
    pub max_config_bytes: u64,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_doc_bytes: default_max_doc_bytes(),
            max_config_bytes: default_max_config_bytes(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_doc_bytes() -> u64 {
    2_000_000
}
fn default_max_config_bytes() -> u64 {
    500_000
}
fn default_max_file_bytes() -> u64 {
    300_000
}

impl FilterConfig {
    pub fn limits(&self) -> FilterLimits {
        FilterLimits {
            max_doc_bytes: self.max_doc_bytes,
            max_config_bytes: self.max_config_bytes,
            max_file_bytes: self.max_file_bytes,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
    #[serde(default = "default_short_overlap_lines")]
    pub short_overlap_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_lines: default_overlap_lines(),
            short_overlap_lines: default_short_overlap_lines(),
        }
    }
}

fn default_max_chars() -> usize {
    1500
}
fn default_overlap_lines() -> usize {
    7
}
fn default_short_overlap_lines() -> usize {
    2
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            max_chars: self.max_chars,
            overlap_lines: self.overlap_lines,
            short_overlap_lines: self.short_overlap_lines,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_overfetch")]
    pub overfetch: usize,
    #[serde(default = "default_summary_boost")]
    pub summary_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            overfetch: default_overfetch(),
            summary_boost: default_summary_boost(),
        }
    }
}

fn default_top_k() -> usize {
    12
}
fn default_overfetch() -> usize {
    3
}
fn default_summary_boost() -> f64 {
    1.0
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            overfetch: self.overfetch,
            summary_boost: self.summary_boost,
        }
    }
}

/// One embedder per embedding space.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub code: EmbeddingSlotConfig,
    #[serde(default)]
    pub text: EmbeddingSlotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingSlotConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL (ollama) or full endpoint (openai-compatible).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSlotConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Vector width of the `hashing` provider when `dims` is unset.
pub const DEFAULT_HASHING_DIMS: usize = 256;

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingSlotConfig {
    /// Vector width, falling back to the provider's default.
    pub fn effective_dims(&self) -> Option<usize> {
        match (self.dims, self.provider.as_str()) {
            (Some(d), _) => Some(d),
            (None, "hashing") => Some(DEFAULT_HASHING_DIMS),
            (None, "local") => Some(384),
            _ => None,
        }
    }

    pub fn api_key_var(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
    }

    fn validate(&self, slot: &str) -> Result<()> {
        match self.provider.as_str() {
            "hashing" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider for embedding.{}: '{}'. Must be hashing, openai, ollama, or local.",
                slot,
                other
            ),
        }
        if matches!(self.provider.as_str(), "openai" | "ollama") && self.model.is_none() {
            bail!(
                "embedding.{}.model must be specified when provider is '{}'",
                slot,
                self.provider
            );
        }
        match self.effective_dims() {
            Some(d) if d > 0 => {}
            _ => bail!(
                "embedding.{}.dims must be > 0 when provider is '{}'",
                slot,
                self.provider
            ),
        }
        if self.batch_size == 0 {
            bail!("embedding.{}.batch_size must be > 0", slot);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Chat completions endpoint; any OpenAI-compatible service works.
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: default_generation_url(),
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: None,
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout() -> u64 {
    60
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn api_key_var(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
    }
}

/// Where repository sources are materialized.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Git clones live here, one directory per repository.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Extra globs skipped when walking a checkout, on top of `.git/**`.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_shallow")]
    pub shallow: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            shallow: default_shallow(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/repos")
}
fn default_shallow() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Seconds before an unreleased ingestion claim may be taken over.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            claim_ttl_secs: default_claim_ttl_secs(),
        }
    }
}

fn default_claim_ttl_secs() -> u64 {
    3600
}

impl IngestConfig {
    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.overfetch < 1 {
        bail!("retrieval.overfetch must be >= 1");
    }
    if !config.retrieval.summary_boost.is_finite() || config.retrieval.summary_boost < 0.0 {
        bail!("retrieval.summary_boost must be a non-negative number");
    }

    if config.ingest.claim_ttl_secs == 0 {
        bail!("ingest.claim_ttl_secs must be > 0");
    }

    config.embedding.code.validate("code")?;
    config.embedding.text.validate("text")?;

    match config.generation.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.generation.model.is_none() {
                bail!("generation.model must be specified when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
