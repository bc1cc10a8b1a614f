//! Ingestion orchestration
//!
//! Drives fetch -> dedupe -> chunk -> embed -> persist for one URL or
//! a full crawl job, recording job-level statistics. One URL's failure
//! never aborts the job it belongs to.

use std::sync::Arc;
use uuid::Uuid;

use crate::chunking::ContentChunker;
use crate::config::{ChunkingConfig, ScraperConfig};
use crate::dedup::{chunk_hash, content_hash, min_hash_signature, DEFAULT_NUM_PERMUTATIONS};
use crate::embeddings::{EmbeddingClient, InputType};
use crate::scrape::{CrawlBackend, ScrapeBackend};
use crate::storage::{JobStats, NewChunk, Storage};
use crate::types::{
    CrawlOptions, JobStatus, ScrapeJobResult, ScrapeResult, ScrapeStoreResult,
    ScheduledScrapeSummary,
};

/// Orchestrates the scraping pipeline
///
/// All collaborators are injected at construction; the service owns no
/// global state.
pub struct ScraperService<S: Storage> {
    storage: Arc<S>,
    reader: Arc<dyn ScrapeBackend>,
    crawler: Option<Arc<dyn CrawlBackend>>,
    embeddings: Option<Arc<EmbeddingClient>>,
    chunker: ContentChunker,
    config: ScraperConfig,
}

impl<S: Storage> ScraperService<S> {
    pub fn new(
        storage: Arc<S>,
        reader: Arc<dyn ScrapeBackend>,
        config: ScraperConfig,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            storage,
            reader,
            crawler: None,
            embeddings: None,
            chunker: ContentChunker::new(chunking),
            config,
        }
    }

    /// Attach the crawl-capable primary backend
    pub fn with_crawler(mut self, crawler: Arc<dyn CrawlBackend>) -> Self {
        self.crawler = Some(crawler);
        self
    }

    /// Attach the embedding client used when embedding generation is
    /// enabled in configuration
    pub fn with_embeddings(mut self, embeddings: Arc<EmbeddingClient>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Fetch a URL via the primary backend, falling back to the reader
    async fn fetch(&self, url: &str) -> ScrapeResult {
        if self.config.use_crawler {
            if let Some(crawler) = &self.crawler {
                let result = crawler.scrape(url).await;
                if result.success {
                    return result;
                }
                tracing::warn!(
                    "{} failed for {}, falling back to {}: {}",
                    crawler.name(),
                    url,
                    self.reader.name(),
                    result.error.as_deref().unwrap_or("no error")
                );
            }
        }
        self.reader.scrape(url).await
    }

    /// Scrape a single URL and store the content
    pub async fn scrape_and_store(&self, source_id: Uuid, url: &str) -> ScrapeStoreResult {
        let scraped = self.fetch(url).await;
        self.store_scraped(source_id, scraped).await
    }

    /// Run the dedupe -> chunk -> embed -> persist flow for content
    /// that has already been fetched
    pub async fn store_scraped(&self, source_id: Uuid, scraped: ScrapeResult) -> ScrapeStoreResult {
        if !scraped.success || scraped.content.is_empty() {
            return ScrapeStoreResult::failure(
                scraped
                    .error
                    .unwrap_or_else(|| "No content retrieved".to_string()),
            );
        }

        let hash = content_hash(&scraped.content);

        // Exact duplicate: short-circuit before chunking or embedding
        if self.config.check_duplicates {
            match self.storage.find_content_id_by_hash(&hash).await {
                Ok(Some(existing_id)) => {
                    tracing::debug!("Duplicate content for {}: {}", scraped.url, existing_id);
                    return ScrapeStoreResult {
                        success: true,
                        content_id: Some(existing_id),
                        chunks_created: 0,
                        is_duplicate: true,
                        error: None,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    return ScrapeStoreResult::failure(format!("Duplicate check failed: {}", e))
                }
            }
        }

        let signature = min_hash_signature(&scraped.content, DEFAULT_NUM_PERMUTATIONS);
        let markdown_preferred = scraped
            .markdown
            .clone()
            .unwrap_or_else(|| scraped.content.clone());

        let content_id = match self
            .storage
            .insert_content(crate::types::NewContent {
                source_id,
                url: scraped.url.clone(),
                title: scraped.title.clone(),
                content: scraped.content,
                content_hash: hash.clone(),
                markdown: scraped.markdown,
                metadata: scraped.metadata,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => return ScrapeStoreResult::failure(format!("Failed to store content: {}", e)),
        };

        if let Err(e) = self.storage.insert_signature(content_id, signature).await {
            return ScrapeStoreResult::failure(format!("Failed to store signature: {}", e));
        }

        let chunks = self.chunker.chunk(&markdown_preferred);
        if chunks.is_empty() {
            return ScrapeStoreResult {
                success: true,
                content_id: Some(content_id),
                chunks_created: 0,
                is_duplicate: false,
                error: None,
            };
        }

        // Embedding is config-gated; a failed batch degrades to
        // storing chunks without vectors rather than failing the URL
        let mut embeddings: Vec<Vec<f32>> = Vec::new();
        if self.config.generate_embeddings {
            if let Some(client) = &self.embeddings {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let result = client.generate_batched(&texts, InputType::Document).await;
                if result.success {
                    embeddings = result.embeddings;
                } else {
                    tracing::warn!(
                        "Embedding generation failed for {}: {}",
                        content_id,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }

        let chunk_count = chunks.len();
        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| NewChunk {
                content_id,
                index: chunk.index,
                chunk_hash: chunk_hash(&chunk.text, &hash, chunk.index),
                token_count: chunk.token_count,
                metadata: chunk.metadata,
                embedding: embeddings.get(i).cloned(),
                text: chunk.text,
            })
            .collect();

        if let Err(e) = self.storage.insert_chunks(rows).await {
            return ScrapeStoreResult {
                success: false,
                content_id: Some(content_id),
                chunks_created: 0,
                is_duplicate: false,
                error: Some(format!("Failed to store chunks: {}", e)),
            };
        }

        ScrapeStoreResult {
            success: true,
            content_id: Some(content_id),
            chunks_created: chunk_count,
            is_duplicate: false,
            error: None,
        }
    }

    /// Run a full scrape job for a source
    ///
    /// A crawl-backend failure fails the whole job; an individual
    /// page's failure is recorded and the job continues.
    pub async fn run_scrape_job(&self, source_id: Uuid) -> ScrapeJobResult {
        let source = match self.storage.get_source(source_id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                return ScrapeJobResult {
                    success: false,
                    job_id: None,
                    pages_scraped: 0,
                    chunks_created: 0,
                    duplicates_found: 0,
                    errors: vec![format!("Source not found: {}", source_id)],
                }
            }
            Err(e) => {
                return ScrapeJobResult {
                    success: false,
                    job_id: None,
                    pages_scraped: 0,
                    chunks_created: 0,
                    duplicates_found: 0,
                    errors: vec![format!("Failed to load source: {}", e)],
                }
            }
        };

        let job_id = match self.storage.create_job(source_id).await {
            Ok(id) => id,
            Err(e) => {
                return ScrapeJobResult {
                    success: false,
                    job_id: None,
                    pages_scraped: 0,
                    chunks_created: 0,
                    duplicates_found: 0,
                    errors: vec![format!("Failed to create job: {}", e)],
                }
            }
        };

        let mut result = ScrapeJobResult {
            success: true,
            job_id: Some(job_id),
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            errors: Vec::new(),
        };

        let crawler = if self.config.use_crawler {
            self.crawler.as_ref()
        } else {
            None
        };

        match crawler {
            Some(crawler) => {
                let crawl = crawler
                    .crawl(
                        &source.url,
                        &CrawlOptions {
                            max_pages: self.config.max_pages,
                            ..CrawlOptions::default()
                        },
                    )
                    .await;

                if !crawl.success {
                    let error = crawl.error.unwrap_or_else(|| "Crawl failed".to_string());
                    result.success = false;
                    result.errors.push(error.clone());
                    self.finalize_job(job_id, JobStatus::Failed, &result, Some(error))
                        .await;
                    return result;
                }

                tracing::info!(
                    "Crawled {} pages from {} for job {}",
                    crawl.pages.len(),
                    source.url,
                    job_id
                );

                for page in crawl.pages {
                    let url = page.url.clone();
                    let stored = self.store_scraped(source_id, page).await;
                    if stored.success {
                        result.pages_scraped += 1;
                        result.chunks_created += stored.chunks_created;
                        if stored.is_duplicate {
                            result.duplicates_found += 1;
                        }
                    } else if let Some(error) = stored.error {
                        result.errors.push(format!("{}: {}", url, error));
                    }
                }
            }
            None => {
                let stored = self.scrape_and_store(source_id, &source.url).await;
                if stored.success {
                    result.pages_scraped = 1;
                    result.chunks_created = stored.chunks_created;
                    if stored.is_duplicate {
                        result.duplicates_found = 1;
                    }
                } else if let Some(error) = stored.error {
                    result.errors.push(error);
                }
            }
        }

        let error_message = if result.errors.is_empty() {
            None
        } else {
            Some(result.errors.join("\n"))
        };
        self.finalize_job(job_id, JobStatus::Completed, &result, error_message)
            .await;

        if let Err(e) = self.storage.touch_source(source_id).await {
            tracing::warn!("Failed to update source {}: {}", source_id, e);
        }

        result
    }

    async fn finalize_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: &ScrapeJobResult,
        error_message: Option<String>,
    ) {
        let stats = JobStats {
            pages_scraped: result.pages_scraped,
            chunks_created: result.chunks_created,
            duplicates_found: result.duplicates_found,
            error_message,
        };
        if let Err(e) = self.storage.finish_job(job_id, status, stats).await {
            tracing::warn!("Failed to finalize job {}: {}", job_id, e);
        }
    }

    /// Run a job for every source due for re-scraping
    pub async fn run_scheduled_scrapes(&self) -> ScheduledScrapeSummary {
        let sources = match self.storage.sources_due_for_scraping().await {
            Ok(sources) => sources,
            Err(e) => {
                return ScheduledScrapeSummary {
                    errors: vec![format!("Failed to list due sources: {}", e)],
                    ..ScheduledScrapeSummary::default()
                }
            }
        };

        let mut summary = ScheduledScrapeSummary::default();
        for source in sources {
            let job = self.run_scrape_job(source.id).await;
            summary.jobs_run += 1;
            summary.total_pages_scraped += job.pages_scraped;
            summary.total_chunks_created += job.chunks_created;
            summary.errors.extend(job.errors);
        }

        summary
    }
}
