//! Scrape backends: a crawl-capable primary and a single-page fallback
//!
//! Backends return structured results with `success`/`error` rather
//! than failing the call; the orchestrator decides how to degrade.

mod firecrawl;
mod jina;

pub use firecrawl::FirecrawlClient;
pub use jina::JinaReaderClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CrawlOptions, CrawlResult, ScrapeResult};

/// Single-page content fetch
#[async_trait]
pub trait ScrapeBackend: Send + Sync {
    /// Fetch and extract one URL
    async fn scrape(&self, url: &str) -> ScrapeResult;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Multi-page site crawling on top of single-page fetch
#[async_trait]
pub trait CrawlBackend: ScrapeBackend {
    /// Crawl a site up to the configured page limit
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> CrawlResult;

    /// Discover site URLs without scraping their content
    async fn map_site(&self, url: &str) -> Result<Vec<String>>;
}

/// Extract a page title from markdown: the first `# ` heading
pub(crate) fn title_from_markdown(markdown: &str) -> Option<String> {
    markdown.lines().find_map(|line| {
        line.strip_prefix("# ")
            .map(|rest| rest.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_first_heading() {
        let md = "Some preamble\n# Page Title\n\nBody\n# Second";
        assert_eq!(title_from_markdown(md), Some("Page Title".to_string()));
        assert_eq!(title_from_markdown("no headings here"), None);
        // Deeper headings do not count as the page title
        assert_eq!(title_from_markdown("## Subsection"), None);
    }
}
