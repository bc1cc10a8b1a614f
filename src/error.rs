//! Error types for the ingestion and search pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credentials, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scrape backend error
    #[error("Failed to scrape '{url}': {message}")]
    Scrape { url: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Search error
    #[error("Search failed: {0}")]
    Search(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// MinHash signatures of different lengths cannot be compared
    #[error("Signature length mismatch: {expected} vs {actual}")]
    SignatureLength { expected: usize, actual: usize },

    /// Embedding vectors of different dimensions cannot be compared
    #[error("Vector dimension mismatch: {expected} vs {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a scrape error
    pub fn scrape(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scrape {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a search error
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for errors that indicate deployment misconfiguration rather
    /// than transient failure. These are never retried.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
