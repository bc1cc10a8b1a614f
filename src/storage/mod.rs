//! Storage contract consumed by the pipeline
//!
//! The pipeline does not own a datastore; it talks to anything that
//! implements this trait. `MemoryStorage` is the in-memory reference
//! implementation used by tests and small deployments.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    ContentRecord, CorpusStats, JobStatus, KnowledgeEntry, NewContent, ScrapeJob, ScrapeSource,
    SearchResult,
};

/// A chunk row ready for insertion
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content_id: Uuid,
    pub index: usize,
    pub text: String,
    /// Content-addressed hash: content hash + index + chunk text
    pub chunk_hash: String,
    pub token_count: usize,
    pub metadata: crate::types::ChunkMetadata,
    pub embedding: Option<Vec<f32>>,
}

/// Final statistics written when a job finishes
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    pub pages_scraped: usize,
    pub chunks_created: usize,
    pub duplicates_found: usize,
    pub error_message: Option<String>,
}

/// Datastore operations the pipeline depends on
#[async_trait]
pub trait Storage: Send + Sync {
    // Content records
    async fn find_content_id_by_hash(&self, content_hash: &str) -> Result<Option<Uuid>>;
    async fn insert_content(&self, content: NewContent) -> Result<Uuid>;
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentRecord>>;

    // MinHash signatures
    async fn insert_signature(&self, content_id: Uuid, signature: Vec<u32>) -> Result<()>;
    async fn list_signatures(&self) -> Result<Vec<(Uuid, Vec<u32>)>>;

    // Chunks
    async fn insert_chunks(&self, chunks: Vec<NewChunk>) -> Result<()>;

    // Search
    async fn text_search_chunks(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
    async fn vector_search_chunks(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;
    async fn text_search_knowledge(&self, query: &str, limit: usize)
        -> Result<Vec<KnowledgeEntry>>;
    async fn vector_search_knowledge(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>>;

    // Sources
    async fn get_source(&self, id: Uuid) -> Result<Option<ScrapeSource>>;
    async fn sources_due_for_scraping(&self) -> Result<Vec<ScrapeSource>>;
    /// Record that a source was just scraped
    async fn touch_source(&self, id: Uuid) -> Result<()>;

    // Jobs
    /// Create a running job record for a source
    async fn create_job(&self, source_id: Uuid) -> Result<Uuid>;
    /// Finish a job; finished jobs are never moved back to running
    async fn finish_job(&self, job_id: Uuid, status: JobStatus, stats: JobStats) -> Result<()>;
    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>>;

    // Statistics
    async fn corpus_stats(&self) -> Result<CorpusStats>;
}
