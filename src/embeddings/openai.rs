//! OpenAI embedding provider (fallback)

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};

use super::provider::{ApiResponse, EmbeddingProvider, InputType, ProviderResponse};

const OPENAI_MODEL: &str = "text-embedding-3-small";
const OPENAI_DIMENSIONS: usize = 1536;
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI embedder
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key,
            endpoint: OPENAI_ENDPOINT.to_string(),
        }
    }

    /// Override the API endpoint (tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<ProviderResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("OPENAI_API_KEY is not set"))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "model": OPENAI_MODEL,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "OpenAI API error: {} - {}",
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
        OPENAI_MODEL
    }

    fn dimensions(&self) -> usize {
        OPENAI_DIMENSIONS
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
