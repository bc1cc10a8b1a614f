//! Scraped content and source types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Result of scraping a single URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub title: Option<String>,
    /// Raw content (HTML or markdown, whatever the backend returned)
    pub content: String,
    /// Markdown rendition when the backend provides one
    pub markdown: Option<String>,
    /// Backend-reported page metadata (description, author, language, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    /// A failed scrape for `url` carrying an error message
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            content: String::new(),
            markdown: None,
            metadata: HashMap::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Result of crawling a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub success: bool,
    pub pages: Vec<ScrapeResult>,
    pub total_pages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Options for a site crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Page limit for the crawl
    pub max_pages: usize,
    /// Restrict crawling to these path prefixes
    pub allowed_paths: Option<Vec<String>>,
    /// Skip these path prefixes
    pub exclude_paths: Option<Vec<String>>,
}

/// A configured scrape source (site or page to ingest)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSource {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub source_type: String,
    /// Re-scrape frequency label understood by the scheduling policy
    pub scrape_frequency: String,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// A fetched document as stored by the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub markdown: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A content record ready for insertion
#[derive(Debug, Clone)]
pub struct NewContent {
    pub source_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub markdown: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}
