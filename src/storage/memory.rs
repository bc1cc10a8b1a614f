//! In-memory storage backend
//!
//! Reference implementation of the storage contract: term-frequency
//! ranking for full-text search, cosine scan for vector search. Suits
//! tests and small single-process deployments.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::dedup::cosine_similarity;
use crate::error::{Error, Result};
use crate::types::{
    ContentRecord, CorpusStats, JobStatus, KnowledgeEntry, NewContent, Provenance, ScrapeJob,
    ScrapeSource, SearchResult,
};

use super::{JobStats, NewChunk, Storage};

#[derive(Debug, Clone)]
struct StoredChunk {
    id: Uuid,
    content_id: Uuid,
    text: String,
    embedding: Option<Vec<f32>>,
    metadata: crate::types::ChunkMetadata,
}

#[derive(Default)]
struct State {
    contents: HashMap<Uuid, ContentRecord>,
    hash_index: HashMap<String, Uuid>,
    signatures: Vec<(Uuid, Vec<u32>)>,
    chunks: Vec<StoredChunk>,
    knowledge: Vec<(KnowledgeEntry, Option<Vec<f32>>)>,
    sources: HashMap<Uuid, ScrapeSource>,
    jobs: HashMap<Uuid, ScrapeJob>,
}

/// In-memory datastore
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scrape source; returns its id
    pub fn add_source(
        &self,
        name: impl Into<String>,
        url: impl Into<String>,
        source_type: impl Into<String>,
        scrape_frequency: impl Into<String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let source = ScrapeSource {
            id,
            name: name.into(),
            url: url.into(),
            source_type: source_type.into(),
            scrape_frequency: scrape_frequency.into(),
            last_scraped_at: None,
        };
        self.state.write().sources.insert(id, source);
        id
    }

    /// Seed a curated knowledge entry, optionally with an embedding
    pub fn add_knowledge_entry(&self, entry: KnowledgeEntry, embedding: Option<Vec<f32>>) {
        self.state.write().knowledge.push((entry, embedding));
    }

    /// Term-frequency score: total occurrences of query terms
    fn term_score(text: &str, terms: &[String]) -> usize {
        let haystack = text.to_lowercase();
        terms
            .iter()
            .map(|term| haystack.matches(term.as_str()).count())
            .sum()
    }

    fn query_terms(query: &str) -> Vec<String> {
        query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect()
    }

    fn chunk_to_result(state: &State, chunk: &StoredChunk, score: f64) -> SearchResult {
        let content = state.contents.get(&chunk.content_id);
        SearchResult {
            id: chunk.id,
            text: chunk.text.clone(),
            score,
            source_url: content.map(|c| c.url.clone()).unwrap_or_default(),
            source_title: content.and_then(|c| c.title.clone()),
            provenance: Provenance::Chunk,
            metadata: HashMap::from([(
                "headers".to_string(),
                serde_json::json!(chunk.metadata.headers),
            )]),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn find_content_id_by_hash(&self, content_hash: &str) -> Result<Option<Uuid>> {
        Ok(self.state.read().hash_index.get(content_hash).copied())
    }

    async fn insert_content(&self, content: NewContent) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let record = ContentRecord {
            id,
            source_id: content.source_id,
            url: content.url,
            title: content.title,
            content: content.content,
            content_hash: content.content_hash.clone(),
            markdown: content.markdown,
            metadata: content.metadata,
            created_at: Utc::now(),
        };
        let mut state = self.state.write();
        state.hash_index.insert(content.content_hash, id);
        state.contents.insert(id, record);
        Ok(id)
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        Ok(self.state.read().contents.get(&id).cloned())
    }

    async fn insert_signature(&self, content_id: Uuid, signature: Vec<u32>) -> Result<()> {
        self.state.write().signatures.push((content_id, signature));
        Ok(())
    }

    async fn list_signatures(&self) -> Result<Vec<(Uuid, Vec<u32>)>> {
        Ok(self.state.read().signatures.clone())
    }

    async fn insert_chunks(&self, chunks: Vec<NewChunk>) -> Result<()> {
        let mut state = self.state.write();
        for chunk in chunks {
            state.chunks.push(StoredChunk {
                id: Uuid::new_v4(),
                content_id: chunk.content_id,
                text: chunk.text,
                embedding: chunk.embedding,
                metadata: chunk.metadata,
            });
        }
        Ok(())
    }

    async fn text_search_chunks(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let terms = Self::query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let mut scored: Vec<(usize, &StoredChunk)> = state
            .chunks
            .iter()
            .map(|chunk| (Self::term_score(&chunk.text, &terms), chunk))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk)| Self::chunk_to_result(&state, chunk, score as f64))
            .collect())
    }

    async fn vector_search_chunks(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        let mut scored: Vec<(f64, &StoredChunk)> = Vec::new();

        for chunk in &state.chunks {
            let Some(chunk_embedding) = &chunk.embedding else {
                continue;
            };
            let similarity = cosine_similarity(embedding, chunk_embedding)?;
            if similarity >= threshold {
                scored.push((similarity, chunk));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk)| Self::chunk_to_result(&state, chunk, score))
            .collect())
    }

    async fn text_search_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>> {
        let terms = Self::query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let mut scored: Vec<(usize, &KnowledgeEntry)> = state
            .knowledge
            .iter()
            .map(|(entry, _)| {
                let haystack = format!(
                    "{} {} {}",
                    entry.title,
                    entry.summary.as_deref().unwrap_or(""),
                    entry.content
                );
                (Self::term_score(&haystack, &terms), entry)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn vector_search_knowledge(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>> {
        let state = self.state.read();
        let mut scored: Vec<(f64, &KnowledgeEntry)> = Vec::new();

        for (entry, entry_embedding) in &state.knowledge {
            let Some(entry_embedding) = entry_embedding else {
                continue;
            };
            let similarity = cosine_similarity(embedding, entry_embedding)?;
            if similarity >= threshold {
                scored.push((similarity, entry));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<ScrapeSource>> {
        Ok(self.state.read().sources.get(&id).cloned())
    }

    async fn sources_due_for_scraping(&self) -> Result<Vec<ScrapeSource>> {
        let now = Utc::now();
        let state = self.state.read();
        Ok(state
            .sources
            .values()
            .filter(|source| {
                let interval = match source.scrape_frequency.as_str() {
                    "hourly" => Duration::hours(1),
                    "daily" => Duration::days(1),
                    "weekly" => Duration::weeks(1),
                    "monthly" => Duration::days(30),
                    _ => Duration::days(1),
                };
                match source.last_scraped_at {
                    None => true,
                    Some(last) => now - last >= interval,
                }
            })
            .cloned()
            .collect())
    }

    async fn touch_source(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        if let Some(source) = state.sources.get_mut(&id) {
            source.last_scraped_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn create_job(&self, source_id: Uuid) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let job = ScrapeJob {
            id,
            source_id,
            status: JobStatus::Running,
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.state.write().jobs.insert(id, job);
        Ok(id)
    }

    async fn finish_job(&self, job_id: Uuid, status: JobStatus, stats: JobStats) -> Result<()> {
        let mut state = self.state.write();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::storage(format!("Job not found: {}", job_id)))?;

        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return Err(Error::storage(format!(
                "Job {} already finished as {:?}",
                job_id, job.status
            )));
        }

        job.status = status;
        job.pages_scraped = stats.pages_scraped;
        job.chunks_created = stats.chunks_created;
        job.duplicates_found = stats.duplicates_found;
        job.error_message = stats.error_message;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>> {
        Ok(self.state.read().jobs.get(&id).cloned())
    }

    async fn corpus_stats(&self) -> Result<CorpusStats> {
        let state = self.state.read();
        Ok(CorpusStats {
            total_sources: state.sources.len(),
            total_pages: state.contents.len(),
            total_chunks: state.chunks.len(),
            knowledge_entries: state.knowledge.len(),
            last_scraped: state
                .sources
                .values()
                .filter_map(|s| s.last_scraped_at)
                .max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: Uuid::new_v4(),
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            summary: None,
            content: content.to_string(),
            entry_type: "article".to_string(),
            category: None,
        }
    }

    fn new_content(source_id: Uuid, url: &str, body: &str) -> NewContent {
        NewContent {
            source_id,
            url: url.to_string(),
            title: Some("Title".to_string()),
            content: body.to_string(),
            content_hash: crate::dedup::content_hash(body),
            markdown: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn hash_lookup_finds_inserted_content() {
        let store = MemoryStorage::new();
        let source_id = store.add_source("s", "https://example.org", "website", "daily");
        let content = new_content(source_id, "https://example.org/a", "page body text");
        let hash = content.content_hash.clone();

        assert!(store.find_content_id_by_hash(&hash).await.unwrap().is_none());
        let id = store.insert_content(content).await.unwrap();
        assert_eq!(store.find_content_id_by_hash(&hash).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn text_search_ranks_by_term_frequency() {
        let store = MemoryStorage::new();
        let source_id = store.add_source("s", "https://example.org", "website", "daily");
        let content_id = store
            .insert_content(new_content(source_id, "https://example.org/a", "body"))
            .await
            .unwrap();

        let chunks = vec![
            NewChunk {
                content_id,
                index: 0,
                text: "health services and health outreach for health programs".to_string(),
                chunk_hash: "h0".to_string(),
                token_count: 10,
                metadata: crate::types::ChunkMetadata {
                    start_char: 0,
                    end_char: 10,
                    headers: vec![],
                    has_code_block: false,
                    has_list: false,
                },
                embedding: None,
            },
            NewChunk {
                content_id,
                index: 1,
                text: "a single mention of health".to_string(),
                chunk_hash: "h1".to_string(),
                token_count: 6,
                metadata: crate::types::ChunkMetadata {
                    start_char: 12,
                    end_char: 20,
                    headers: vec![],
                    has_code_block: false,
                    has_list: false,
                },
                embedding: None,
            },
        ];
        store.insert_chunks(chunks).await.unwrap();

        let results = store.text_search_chunks("health", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);
        assert!(results[0].text.contains("outreach"));
        assert_eq!(results[0].source_url, "https://example.org/a");
    }

    #[tokio::test]
    async fn vector_search_applies_threshold() {
        let store = MemoryStorage::new();
        let source_id = store.add_source("s", "https://example.org", "website", "daily");
        let content_id = store
            .insert_content(new_content(source_id, "https://example.org/a", "body"))
            .await
            .unwrap();

        let meta = crate::types::ChunkMetadata {
            start_char: 0,
            end_char: 1,
            headers: vec![],
            has_code_block: false,
            has_list: false,
        };
        store
            .insert_chunks(vec![
                NewChunk {
                    content_id,
                    index: 0,
                    text: "aligned".to_string(),
                    chunk_hash: "h0".to_string(),
                    token_count: 1,
                    metadata: meta.clone(),
                    embedding: Some(vec![1.0, 0.0]),
                },
                NewChunk {
                    content_id,
                    index: 1,
                    text: "orthogonal".to_string(),
                    chunk_hash: "h1".to_string(),
                    token_count: 1,
                    metadata: meta,
                    embedding: Some(vec![0.0, 1.0]),
                },
            ])
            .await
            .unwrap();

        let results = store
            .vector_search_chunks(&[1.0, 0.0], 0.5, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "aligned");
    }

    #[tokio::test]
    async fn finished_jobs_cannot_be_refinished() {
        let store = MemoryStorage::new();
        let source_id = store.add_source("s", "https://example.org", "website", "daily");
        let job_id = store.create_job(source_id).await.unwrap();

        store
            .finish_job(job_id, JobStatus::Completed, JobStats::default())
            .await
            .unwrap();
        let err = store
            .finish_job(job_id, JobStatus::Failed, JobStats::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn due_sources_respect_frequency() {
        let store = MemoryStorage::new();
        let id = store.add_source("s", "https://example.org", "website", "daily");

        // Never scraped: due
        let due = store.sources_due_for_scraping().await.unwrap();
        assert_eq!(due.len(), 1);

        store.touch_source(id).await.unwrap();
        let due = store.sources_due_for_scraping().await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn knowledge_text_search_matches_title_and_content() {
        let store = MemoryStorage::new();
        store.add_knowledge_entry(entry("Health Services", "clinic opening hours"), None);
        store.add_knowledge_entry(entry("Sports Program", "weekly football training"), None);

        let hits = store.text_search_knowledge("health", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Health Services");
    }
}
