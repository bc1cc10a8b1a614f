//! Configuration for the ingestion and search pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Scraper configuration
    #[serde(default)]
    pub scraper: ScraperConfig,
    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// AI response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::config(format!("Invalid config file: {}", e)))
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Token budget per chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Overlap carried from the previous chunk, in tokens
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    /// Track header breadcrumbs in chunk metadata
    #[serde(default = "default_true")]
    pub preserve_headers: bool,
    /// Keep fenced code blocks atomic instead of sentence-splitting them
    #[serde(default = "default_true")]
    pub preserve_code_blocks: bool,
}

fn default_max_tokens() -> usize {
    256
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_true() -> bool {
    true
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            overlap_tokens: 50,
            preserve_headers: true,
            preserve_code_blocks: true,
        }
    }
}

/// Which embedding provider to try first
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreferredProvider {
    /// Voyage AI (voyage-3-lite, 1024 dimensions)
    #[default]
    Voyage,
    /// OpenAI (text-embedding-3-small, 1536 dimensions)
    OpenAi,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider tried first; the other is the fallback
    #[serde(default)]
    pub preferred_provider: PreferredProvider,
    /// Voyage API key; falls back to the VOYAGE_API_KEY env var
    #[serde(default)]
    pub voyage_api_key: Option<String>,
    /// OpenAI API key; falls back to the OPENAI_API_KEY env var
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Texts per batch in batched embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between sequential batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    100
}
fn default_batch_delay_ms() -> u64 {
    100
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            preferred_provider: PreferredProvider::Voyage,
            voyage_api_key: None,
            openai_api_key: None,
            batch_size: 100,
            batch_delay_ms: 100,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the Voyage API key from config or environment
    pub fn resolve_voyage_key(&self) -> Option<String> {
        self.voyage_api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
    }

    /// Resolve the OpenAI API key from config or environment
    pub fn resolve_openai_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Scraper / ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Use the crawl-capable primary backend; when false, only the
    /// single-page reader backend is used
    #[serde(default = "default_true")]
    pub use_crawler: bool,
    /// Page limit per crawl job
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Generate embeddings for chunks at ingestion time
    #[serde(default)]
    pub generate_embeddings: bool,
    /// Check exact-hash duplicates before storing
    #[serde(default = "default_true")]
    pub check_duplicates: bool,
    /// Firecrawl API key; falls back to the FIRECRAWL_API_KEY env var
    #[serde(default)]
    pub firecrawl_api_key: Option<String>,
    /// Jina Reader API key (optional, keyless free tier exists);
    /// falls back to the JINA_API_KEY env var
    #[serde(default)]
    pub jina_api_key: Option<String>,
}

fn default_max_pages() -> usize {
    50
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            use_crawler: true,
            max_pages: 50,
            generate_embeddings: false,
            check_duplicates: true,
            firecrawl_api_key: None,
            jina_api_key: None,
        }
    }
}

impl ScraperConfig {
    /// Resolve the Firecrawl API key from config or environment
    pub fn resolve_firecrawl_key(&self) -> Option<String> {
        self.firecrawl_api_key
            .clone()
            .or_else(|| std::env::var("FIRECRAWL_API_KEY").ok())
    }

    /// Resolve the Jina API key from config or environment
    pub fn resolve_jina_key(&self) -> Option<String> {
        self.jina_api_key
            .clone()
            .or_else(|| std::env::var("JINA_API_KEY").ok())
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default result count per search
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum similarity for vector search hits
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Token budget for assembled RAG context
    #[serde(default = "default_context_tokens")]
    pub max_context_tokens: usize,
    /// Include the curated knowledge base in hybrid search
    #[serde(default = "default_true")]
    pub include_knowledge_base: bool,
}

fn default_limit() -> usize {
    10
}
fn default_threshold() -> f64 {
    0.5
}
fn default_context_tokens() -> usize {
    2000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.5,
            max_context_tokens: 2000,
            include_knowledge_base: true,
        }
    }
}

/// AI response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached entries before eviction kicks in
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Default TTL in seconds for entries stored without an explicit TTL
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

fn default_cache_entries() -> usize {
    1000
}
fn default_cache_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.max_tokens, 256);
        assert_eq!(config.chunking.overlap_tokens, 50);
        assert!(config.chunking.preserve_code_blocks);
        assert_eq!(config.embeddings.batch_size, 100);
        assert_eq!(config.scraper.max_pages, 50);
        assert!(!config.scraper.generate_embeddings);
        assert_eq!(config.search.max_context_tokens, 2000);
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            max_tokens = 128

            [scraper]
            max_pages = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.max_tokens, 128);
        assert_eq!(config.chunking.overlap_tokens, 50);
        assert_eq!(config.scraper.max_pages, 10);
        assert!(config.scraper.use_crawler);
    }
}
