//! Embedding generation with provider fallback and batch support
//!
//! The fallback chain is an explicit ordered provider list tried in
//! sequence; each attempt produces a tagged outcome, so callers never
//! need branch logic on which provider answered.

mod openai;
mod provider;
mod voyage;

pub use openai::OpenAiEmbedder;
pub use provider::{EmbeddingProvider, InputType, ProviderResponse};
pub use voyage::VoyageEmbedder;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{AiCache, CacheTtl};
use crate::config::{EmbeddingConfig, PreferredProvider};
use crate::error::{Error, Result};

/// Maximum characters submitted per single-text embedding
const SINGLE_TEXT_LIMIT: usize = 30_000;
/// Cache key length for single-text embeddings
const CACHE_KEY_CHARS: usize = 500;

/// Aggregate result of an embedding call
///
/// `model` reflects whichever provider actually produced the vectors.
/// On failure `embeddings` holds whatever was produced before the
/// failure (relevant for batched generation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub total_tokens: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single cached embedding with its producing model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleEmbedding {
    pub embedding: Vec<f32>,
    pub model: String,
    pub total_tokens: u64,
}

/// Embedding client with automatic provider fallback
pub struct EmbeddingClient {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    cache: Arc<AiCache>,
    batch_size: usize,
    batch_delay: Duration,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("providers", &self.providers.len())
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .finish()
    }
}

impl EmbeddingClient {
    /// Build the client from configuration
    ///
    /// Fails with a configuration error when no provider has
    /// credentials; that is a deployment problem, not a transient one.
    pub fn new(config: &EmbeddingConfig, cache: Arc<AiCache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let voyage: Arc<dyn EmbeddingProvider> =
            Arc::new(VoyageEmbedder::new(config.resolve_voyage_key(), http.clone()));
        let openai: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbedder::new(config.resolve_openai_key(), http));

        let providers = match config.preferred_provider {
            PreferredProvider::Voyage => vec![voyage, openai],
            PreferredProvider::OpenAi => vec![openai, voyage],
        };

        Self::from_providers(providers, cache, config.batch_size, config.batch_delay_ms)
    }

    /// Build the client from an explicit ordered provider list
    pub fn from_providers(
        providers: Vec<Arc<dyn EmbeddingProvider>>,
        cache: Arc<AiCache>,
        batch_size: usize,
        batch_delay_ms: u64,
    ) -> Result<Self> {
        if !providers.iter().any(|p| p.is_configured()) {
            return Err(Error::config(
                "No embedding provider credentials configured",
            ));
        }

        Ok(Self {
            providers,
            cache,
            batch_size: batch_size.max(1),
            batch_delay: Duration::from_millis(batch_delay_ms),
        })
    }

    /// Generate embeddings, falling back through the provider list
    ///
    /// Each provider is tried once in order; transient failures move
    /// on to the next provider rather than retrying the same one.
    pub async fn generate(&self, texts: &[String], input_type: InputType) -> EmbeddingResult {
        let mut failures: Vec<String> = Vec::new();

        for provider in &self.providers {
            match provider.embed(texts, input_type).await {
                Ok(response) => {
                    if !failures.is_empty() {
                        tracing::warn!(
                            "Embedding fell back to {} after: {}",
                            provider.name(),
                            failures.join("; ")
                        );
                    }
                    return EmbeddingResult {
                        embeddings: response.embeddings,
                        model: provider.model().to_string(),
                        total_tokens: response.total_tokens,
                        success: true,
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::debug!("Provider {} failed: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        EmbeddingResult {
            embeddings: Vec::new(),
            model: self
                .providers
                .first()
                .map(|p| p.model().to_string())
                .unwrap_or_default(),
            total_tokens: 0,
            success: false,
            error: Some(failures.join("; ")),
        }
    }

    /// Embed a large text array in fixed-size sequential batches
    ///
    /// Batches run strictly in order with a small delay between them
    /// for provider rate-limit courtesy. The first failing batch stops
    /// the run; the result reports the partial embedding set and which
    /// batch failed.
    pub async fn generate_batched(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> EmbeddingResult {
        let mut all_embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut total_tokens = 0u64;
        let mut model = String::new();

        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            let result = self.generate(batch, input_type).await;

            if !result.success {
                return EmbeddingResult {
                    embeddings: all_embeddings,
                    model: if model.is_empty() { result.model } else { model },
                    total_tokens,
                    success: false,
                    error: Some(format!(
                        "Batch {} failed: {}",
                        batch_number + 1,
                        result.error.unwrap_or_else(|| "unknown error".to_string())
                    )),
                };
            }

            all_embeddings.extend(result.embeddings);
            total_tokens += result.total_tokens;
            model = result.model;

            let processed = (batch_number + 1) * self.batch_size;
            if processed < texts.len() && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        EmbeddingResult {
            embeddings: all_embeddings,
            model,
            total_tokens,
            success: true,
            error: None,
        }
    }

    /// Embed one text, cache-backed
    ///
    /// Embeddings of fixed text are deterministic and expensive to
    /// regenerate, so hits are served for a long TTL. The key is the
    /// leading slice of the cleaned text.
    pub async fn embed_single(&self, text: &str, input_type: InputType) -> Result<SingleEmbedding> {
        let cleaned: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let cleaned: String = cleaned.chars().take(SINGLE_TEXT_LIMIT).collect();

        let cache_key: String = cleaned.chars().take(CACHE_KEY_CHARS).collect();
        if let Some(cached) = self
            .cache
            .get::<SingleEmbedding, _>("embedding", &[&cache_key])
        {
            return Ok(cached);
        }

        let result = self.generate(&[cleaned], input_type).await;
        if !result.success {
            return Err(Error::embedding(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let embedding = result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Provider returned no vectors"))?;

        let single = SingleEmbedding {
            embedding,
            model: result.model,
            total_tokens: result.total_tokens,
        };
        self.cache
            .set("embedding", &[&cache_key], &single, Some(CacheTtl::VERY_LONG));

        Ok(single)
    }
}
