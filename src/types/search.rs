//! Search result types and RAG context assembly outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Where a search result came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// A chunk of scraped content
    Chunk,
    /// A curated knowledge-base entry
    Knowledge,
    /// A community story
    Story,
}

/// A ranked search hit
///
/// Computed per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub text: String,
    /// Relevance score from the backend that produced the hit (lexical
    /// rank or vector similarity; scores from different backends are
    /// not comparable across groups)
    pub score: f64,
    pub source_url: String,
    pub source_title: Option<String>,
    pub provenance: Provenance,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A curated knowledge-base entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub entry_type: String,
    pub category: Option<String>,
}

/// Hybrid search output: two labeled groups, blending left to the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridSearchResults {
    pub chunks: Vec<SearchResult>,
    pub knowledge_entries: Vec<KnowledgeEntry>,
}

impl HybridSearchResults {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.knowledge_entries.is_empty()
    }
}

/// A deduplicated source attribution for citation display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// Assembled context plus its source attributions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagContext {
    pub context: String,
    pub sources: Vec<SourceRef>,
}

/// Statistics about the ingested corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_sources: usize,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub knowledge_entries: usize,
    pub last_scraped: Option<DateTime<Utc>>,
}
