//! Voyage AI embedding provider (primary)

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::provider::{ApiResponse, EmbeddingProvider, InputType, ProviderResponse};

const VOYAGE_MODEL: &str = "voyage-3-lite";
const VOYAGE_DIMENSIONS: usize = 1024;
const VOYAGE_ENDPOINT: &str = "https://api.voyageai.com/v1/embeddings";

/// Voyage AI embedder
pub struct VoyageEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl VoyageEmbedder {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key,
            endpoint: VOYAGE_ENDPOINT.to_string(),
        }
    }

    /// Override the API endpoint (tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbedder {
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<ProviderResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("VOYAGE_API_KEY is not set"))?;

        let input_type = match input_type {
            InputType::Document => "document",
            InputType::Query => "query",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "model": VOYAGE_MODEL,
                "input": texts,
                "input_type": input_type,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Voyage API error: {} - {}",
                status, body
            )));
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(ProviderResponse {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            total_tokens: parsed.usage.unwrap_or_default().total_tokens,
        })
    }

    fn model(&self) -> &str {
        VOYAGE_MODEL
    }

    fn dimensions(&self) -> usize {
        VOYAGE_DIMENSIONS
    }

    fn name(&self) -> &str {
        "voyage"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
