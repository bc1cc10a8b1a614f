//! commons-rag: RAG ingestion and hybrid search pipeline
//!
//! Turns scraped or authored text into deduplicated, retrievable,
//! token-bounded chunks and serves relevance-ranked search over them:
//!
//! - Chunking along semantic boundaries with configurable overlap
//! - Multi-level deduplication: exact hash, MinHash near-duplicate,
//!   embedding-space semantic duplicate
//! - Embedding generation with automatic provider fallback and batching
//! - Hybrid (lexical + vector) retrieval with token-bounded context
//!   assembly and source citations
//!
//! The crate is a library consumed by HTTP route handlers; it owns no
//! wire protocol, file format, or CLI. The datastore is consumed
//! through the [`storage::Storage`] trait.

pub mod cache;
pub mod chunking;
pub mod config;
pub mod dedup;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod rate_limit;
pub mod scrape;
pub mod search;
pub mod storage;
pub mod types;

pub use cache::{AiCache, CacheMaintenance, CacheTtl};
pub use chunking::{estimate_tokens, ContentChunker};
pub use config::RagConfig;
pub use embeddings::{EmbeddingClient, EmbeddingProvider, InputType};
pub use error::{Error, Result};
pub use ingest::ScraperService;
pub use rate_limit::{EndpointKind, RateLimiter};
pub use search::{build_rag_context, ContextOptions, SearchOptions, SearchService};
pub use storage::{MemoryStorage, Storage};
pub use types::{Chunk, ChunkMetadata, ScrapeResult, SearchResult};
