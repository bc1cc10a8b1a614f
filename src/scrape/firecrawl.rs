//! Firecrawl client: primary scraper with crawl support

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{CrawlOptions, CrawlResult, ScrapeResult};

use super::{CrawlBackend, ScrapeBackend};

const FIRECRAWL_BASE: &str = "https://api.firecrawl.dev/v1";

/// Firecrawl HTTP client
pub struct FirecrawlClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<PageDocument>,
}

#[derive(Debug, Deserialize)]
struct CrawlResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<PageDocument>,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PageDocument {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl FirecrawlClient {
    /// Build the client; a missing API key is a configuration error
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| Error::config("FIRECRAWL_API_KEY is not set"))?;
        Ok(Self {
            client,
            api_key,
            base_url: FIRECRAWL_BASE.to_string(),
        })
    }

    /// Override the API base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn page_to_result(&self, url: &str, page: PageDocument) -> ScrapeResult {
        let markdown = page.markdown;
        let content = page
            .html
            .clone()
            .or_else(|| markdown.clone())
            .unwrap_or_default();

        let title = page
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let url = page
            .metadata
            .get("sourceURL")
            .and_then(|v| v.as_str())
            .unwrap_or(url)
            .to_string();

        let mut metadata = HashMap::new();
        for key in ["description", "author", "publishedDate", "language", "ogImage"] {
            if let Some(value) = page.metadata.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }

        ScrapeResult {
            url,
            title,
            content,
            markdown,
            metadata,
            success: true,
            error: None,
        }
    }
}

#[async_trait]
impl ScrapeBackend for FirecrawlClient {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        let request = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "url": url,
                "formats": ["markdown", "html"],
                "onlyMainContent": true,
            }))
            .send()
            .await;

        let response = match request {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => return ScrapeResult::failure(url, format!("Scrape failed: HTTP {}", r.status())),
            Err(e) => return ScrapeResult::failure(url, e.to_string()),
        };

        let parsed: ScrapeResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return ScrapeResult::failure(url, format!("Invalid scrape response: {}", e)),
        };

        match parsed.data {
            Some(page) if parsed.success && page.markdown.is_some() => {
                self.page_to_result(url, page)
            }
            _ => ScrapeResult::failure(url, "Scrape failed - no content"),
        }
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[async_trait]
impl CrawlBackend for FirecrawlClient {
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> CrawlResult {
        let mut body = json!({
            "url": url,
            "limit": options.max_pages,
            "scrapeOptions": {
                "formats": ["markdown"],
                "onlyMainContent": true,
            },
        });
        if let Some(paths) = &options.allowed_paths {
            body["includePaths"] = json!(paths);
        }
        if let Some(paths) = &options.exclude_paths {
            body["excludePaths"] = json!(paths);
        }

        let request = self
            .client
            .post(format!("{}/crawl", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let response = match request {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                return CrawlResult {
                    success: false,
                    pages: Vec::new(),
                    total_pages: 0,
                    error: Some(format!("Crawl failed: HTTP {}", r.status())),
                }
            }
            Err(e) => {
                return CrawlResult {
                    success: false,
                    pages: Vec::new(),
                    total_pages: 0,
                    error: Some(e.to_string()),
                }
            }
        };

        let parsed: CrawlResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                return CrawlResult {
                    success: false,
                    pages: Vec::new(),
                    total_pages: 0,
                    error: Some(format!("Invalid crawl response: {}", e)),
                }
            }
        };

        if !parsed.success {
            return CrawlResult {
                success: false,
                pages: Vec::new(),
                total_pages: 0,
                error: Some("Crawl failed".to_string()),
            };
        }

        let pages: Vec<ScrapeResult> = parsed
            .data
            .into_iter()
            .map(|page| self.page_to_result(url, page))
            .collect();

        CrawlResult {
            success: true,
            total_pages: pages.len(),
            pages,
            error: None,
        }
    }

    async fn map_site(&self, url: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .post(format!("{}/map", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": url }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::scrape(
                url,
                format!("Map failed: HTTP {}", response.status()),
            ));
        }

        let parsed: MapResponse = response.json().await?;
        Ok(parsed.links)
    }
}
