//! Embedding provider trait shared by the HTTP backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether texts are being embedded as stored documents or as a query
///
/// Providers that distinguish the two (Voyage) use it to pick the
/// embedding mode; others ignore it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Document,
    Query,
}

/// Raw response from one provider call
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

/// Trait for generating text embeddings
///
/// Implementations:
/// - `VoyageEmbedder`: Voyage AI (voyage-3-lite, 1024 dimensions)
/// - `OpenAiEmbedder`: OpenAI (text-embedding-3-small, 1536 dimensions)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts in one call
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<ProviderResponse>;

    /// Model identifier tagged onto produced vectors
    fn model(&self) -> &str;

    /// Embedding dimensions; vectors of different dimensions are never
    /// compared directly
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Whether credentials are available for this provider
    fn is_configured(&self) -> bool;
}

/// Wire shape shared by both embedding APIs
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    pub data: Vec<ApiEmbedding>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEmbedding {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub total_tokens: u64,
}
