//! Shared data types for the ingestion and search pipeline

pub mod chunk;
pub mod content;
pub mod job;
pub mod search;

pub use chunk::{Chunk, ChunkMetadata, SourcedChunk};
pub use content::{
    ContentRecord, CrawlOptions, CrawlResult, NewContent, ScrapeResult, ScrapeSource,
};
pub use job::{JobStatus, ScrapeJob, ScrapeJobResult, ScrapeStoreResult, ScheduledScrapeSummary};
pub use search::{
    CorpusStats, HybridSearchResults, KnowledgeEntry, Provenance, RagContext, SearchResult,
    SourceRef,
};
