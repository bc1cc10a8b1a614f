//! Hybrid search and RAG context assembly
//!
//! Lexical search, vector search with graceful degradation to lexical,
//! and greedy token-bounded context building with source attribution.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::embeddings::{EmbeddingClient, InputType};
use crate::storage::Storage;
use crate::types::{
    HybridSearchResults, KnowledgeEntry, RagContext, SearchResult, SourceRef,
};

/// Per-call search options; unset fields use the service defaults
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub include_knowledge_base: Option<bool>,
}

/// Options for context assembly
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Token budget for the assembled context
    pub max_tokens: usize,
    /// Prefix each snippet with its source title
    pub include_source: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            include_source: true,
        }
    }
}

/// Search service over the ingested corpus and curated knowledge base
pub struct SearchService<S: Storage> {
    storage: Arc<S>,
    embeddings: Option<Arc<EmbeddingClient>>,
    config: SearchConfig,
}

impl<S: Storage> SearchService<S> {
    pub fn new(storage: Arc<S>, config: SearchConfig) -> Self {
        Self {
            storage,
            embeddings: None,
            config,
        }
    }

    /// Attach the embedding client that powers vector search
    pub fn with_embeddings(mut self, embeddings: Arc<EmbeddingClient>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    fn limit(&self, options: &SearchOptions) -> usize {
        options.limit.unwrap_or(self.config.limit)
    }

    fn threshold(&self, options: &SearchOptions) -> f64 {
        options.threshold.unwrap_or(self.config.threshold)
    }

    /// Lexical search over chunk text
    ///
    /// A backend error degrades to empty results rather than failing
    /// the request.
    pub async fn text_search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        match self
            .storage
            .text_search_chunks(query, self.limit(options))
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Text search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Vector search over chunk embeddings
    ///
    /// Embedding failure or a search-backend error falls back to
    /// `text_search` transparently; retrieval degrades, it does not
    /// fail outright.
    pub async fn vector_search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let Some(client) = &self.embeddings else {
            return self.text_search(query, options).await;
        };

        let query_embedding = match client.embed_single(query, InputType::Query).await {
            Ok(single) => single.embedding,
            Err(e) => {
                tracing::warn!("Query embedding failed, using text search: {}", e);
                return self.text_search(query, options).await;
            }
        };

        match self
            .storage
            .vector_search_chunks(&query_embedding, self.threshold(options), self.limit(options))
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Vector search failed, using text search: {}", e);
                self.text_search(query, options).await
            }
        }
    }

    /// Search the curated knowledge base, vector first when possible
    async fn search_knowledge_base(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<KnowledgeEntry> {
        let limit = self.limit(options);

        if let Some(client) = &self.embeddings {
            if let Ok(single) = client.embed_single(query, InputType::Query).await {
                match self
                    .storage
                    .vector_search_knowledge(&single.embedding, self.threshold(options), limit)
                    .await
                {
                    Ok(entries) if !entries.is_empty() => return entries,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Knowledge vector search failed: {}", e);
                    }
                }
            }
        }

        match self.storage.text_search_knowledge(query, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Knowledge base search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Hybrid search: chunks and knowledge entries as two labeled
    /// groups, final blending left to the caller
    pub async fn hybrid_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> HybridSearchResults {
        let include_kb = options
            .include_knowledge_base
            .unwrap_or(self.config.include_knowledge_base);

        if include_kb {
            let (chunks, knowledge_entries) = tokio::join!(
                self.vector_search(query, options),
                self.search_knowledge_base(query, options)
            );
            HybridSearchResults {
                chunks,
                knowledge_entries,
            }
        } else {
            HybridSearchResults {
                chunks: self.vector_search(query, options).await,
                knowledge_entries: Vec::new(),
            }
        }
    }

    /// Top-level RAG entry point: hybrid search, context assembly, and
    /// a deduplicated source list for citation display
    pub async fn get_rag_context(&self, question: &str, options: &SearchOptions) -> RagContext {
        let results = self.hybrid_search(question, options).await;

        let context = build_rag_context(
            &results.chunks,
            &results.knowledge_entries,
            &ContextOptions {
                max_tokens: self.config.max_context_tokens,
                include_source: false,
            },
        );

        let mut sources: Vec<SourceRef> = Vec::new();
        let mut seen: HashMap<String, ()> = HashMap::new();

        for chunk in &results.chunks {
            if seen.insert(chunk.source_url.clone(), ()).is_none() {
                sources.push(SourceRef {
                    title: chunk
                        .source_title
                        .clone()
                        .unwrap_or_else(|| chunk.source_url.clone()),
                    url: chunk.source_url.clone(),
                });
            }
        }

        for entry in &results.knowledge_entries {
            let key = format!("kb:{}", entry.slug);
            if seen.insert(key, ()).is_none() {
                sources.push(SourceRef {
                    title: entry.title.clone(),
                    url: format!("/wiki/{}", entry.slug),
                });
            }
        }

        RagContext { context, sources }
    }

    /// Find content related to a stored record via lexical search
    /// seeded from its title or lead text
    pub async fn find_related_content(&self, content_id: Uuid, limit: usize) -> Vec<SearchResult> {
        let record = match self.storage.get_content(content_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Related-content lookup failed: {}", e);
                return Vec::new();
            }
        };

        let seed = record
            .title
            .clone()
            .unwrap_or_else(|| record.content.chars().take(200).collect());

        self.text_search(
            &seed,
            &SearchOptions {
                limit: Some(limit),
                ..SearchOptions::default()
            },
        )
        .await
    }

    /// Statistics about the knowledge corpus
    pub async fn corpus_stats(&self) -> crate::types::CorpusStats {
        match self.storage.corpus_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Corpus stats failed: {}", e);
                crate::types::CorpusStats::default()
            }
        }
    }
}

/// Assemble a token-bounded context string from search results
///
/// Knowledge entries are consumed first (curated content is trusted
/// more), then scraped chunks, each group in its backend's relevance
/// order. A greedy fill stops before any snippet that would push the
/// accumulated character budget past `max_tokens * 4`.
pub fn build_rag_context(
    chunks: &[SearchResult],
    knowledge_entries: &[KnowledgeEntry],
    options: &ContextOptions,
) -> String {
    let max_chars = options.max_tokens * 4;
    let mut parts: Vec<String> = Vec::new();
    let mut total_chars = 0usize;

    for entry in knowledge_entries {
        let content = entry
            .summary
            .clone()
            .unwrap_or_else(|| entry.content.chars().take(500).collect());
        let part = if options.include_source {
            format!("[{}]: {}", entry.title, content)
        } else {
            content
        };

        let part_len = part.chars().count();
        if total_chars + part_len > max_chars {
            break;
        }
        parts.push(part);
        total_chars += part_len;
    }

    for chunk in chunks {
        let part = if options.include_source {
            let title = chunk
                .source_title
                .as_deref()
                .unwrap_or(chunk.source_url.as_str());
            format!("[{}]: {}", title, chunk.text)
        } else {
            chunk.text.clone()
        };

        let part_len = part.chars().count();
        if total_chars + part_len > max_chars {
            break;
        }
        parts.push(part);
        total_chars += part_len;
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::estimate_tokens;
    use crate::types::Provenance;

    fn chunk_result(text: &str, url: &str, title: Option<&str>) -> SearchResult {
        SearchResult {
            id: Uuid::new_v4(),
            text: text.to_string(),
            score: 1.0,
            source_url: url.to_string(),
            source_title: title.map(|t| t.to_string()),
            provenance: Provenance::Chunk,
            metadata: HashMap::new(),
        }
    }

    fn knowledge(title: &str, summary: Option<&str>, content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: Uuid::new_v4(),
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            summary: summary.map(|s| s.to_string()),
            content: content.to_string(),
            entry_type: "article".to_string(),
            category: None,
        }
    }

    #[test]
    fn context_prioritizes_knowledge_entries() {
        let chunks = vec![chunk_result("scraped text", "https://a", Some("A"))];
        let entries = vec![knowledge("Entry", Some("curated summary"), "full body")];

        let context = build_rag_context(&chunks, &entries, &ContextOptions::default());
        let curated_pos = context.find("curated summary").unwrap();
        let scraped_pos = context.find("scraped text").unwrap();
        assert!(curated_pos < scraped_pos);
    }

    #[test]
    fn context_respects_token_budget() {
        let chunks: Vec<SearchResult> = (0..20)
            .map(|i| chunk_result(&format!("chunk {} {}", i, "word ".repeat(50)), "https://a", None))
            .collect();

        let options = ContextOptions {
            max_tokens: 100,
            include_source: false,
        };
        let context = build_rag_context(&chunks, &[], &options);
        assert!(estimate_tokens(&context) <= 100 + 2);
        assert!(!context.is_empty());
    }

    #[test]
    fn context_includes_source_labels_when_asked() {
        let chunks = vec![chunk_result("body text", "https://a", Some("Page Title"))];
        let context = build_rag_context(&chunks, &[], &ContextOptions::default());
        assert!(context.starts_with("[Page Title]: body text"));

        let bare = build_rag_context(
            &chunks,
            &[],
            &ContextOptions {
                include_source: false,
                ..ContextOptions::default()
            },
        );
        assert_eq!(bare, "body text");
    }

    #[test]
    fn knowledge_summary_falls_back_to_content_prefix() {
        let long_body = "x".repeat(800);
        let entries = vec![knowledge("Entry", None, &long_body)];
        let context = build_rag_context(&[], &entries, &ContextOptions::default());
        assert_eq!(context.chars().count(), 500);
    }

    #[test]
    fn oversized_first_item_yields_empty_context() {
        let chunks = vec![chunk_result(&"word ".repeat(200), "https://a", None)];
        let options = ContextOptions {
            max_tokens: 10,
            include_source: false,
        };
        assert!(build_rag_context(&chunks, &[], &options).is_empty());
    }
}
