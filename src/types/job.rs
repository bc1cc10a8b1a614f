//! Scrape job types and per-URL ingestion results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status
///
/// Jobs move `Pending -> Running -> {Completed | Failed}` and never
/// return to `Running` once finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A scrape job record tracked by the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub source_id: Uuid,
    pub status: JobStatus,
    pub pages_scraped: usize,
    pub chunks_created: usize,
    pub duplicates_found: usize,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of ingesting a single URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeStoreResult {
    pub success: bool,
    /// Id of the stored content record, or of the existing record when
    /// the content was an exact duplicate
    pub content_id: Option<Uuid>,
    pub chunks_created: usize,
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeStoreResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content_id: None,
            chunks_created: 0,
            is_duplicate: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate statistics for one scrape job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJobResult {
    pub success: bool,
    pub job_id: Option<Uuid>,
    pub pages_scraped: usize,
    pub chunks_created: usize,
    pub duplicates_found: usize,
    pub errors: Vec<String>,
}

/// Aggregate statistics across all jobs of a scheduled run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledScrapeSummary {
    pub jobs_run: usize,
    pub total_pages_scraped: usize,
    pub total_chunks_created: usize,
    pub errors: Vec<String>,
}
