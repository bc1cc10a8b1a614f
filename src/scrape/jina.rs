//! Jina Reader client: fallback single-page extraction
//!
//! Works without credentials (free tier); the key only raises limits.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::ScrapeResult;

use super::{title_from_markdown, ScrapeBackend};

const JINA_READER_BASE: &str = "https://r.jina.ai";

/// Jina Reader HTTP client
pub struct JinaReaderClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl JinaReaderClient {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key,
            base_url: JINA_READER_BASE.to_string(),
        }
    }

    /// Override the reader base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ScrapeBackend for JinaReaderClient {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        let mut request = self
            .client
            .get(format!("{}/{}", self.base_url, url))
            .header("Accept", "text/markdown");

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return ScrapeResult::failure(url, e.to_string()),
        };

        if !response.status().is_success() {
            return ScrapeResult::failure(url, format!("HTTP {}", response.status()));
        }

        let content = match response.text().await {
            Ok(t) => t,
            Err(e) => return ScrapeResult::failure(url, e.to_string()),
        };

        let title = title_from_markdown(&content);

        ScrapeResult {
            url: url.to_string(),
            title,
            markdown: Some(content.clone()),
            content,
            metadata: HashMap::new(),
            success: true,
            error: None,
        }
    }

    fn name(&self) -> &str {
        "jina"
    }
}
