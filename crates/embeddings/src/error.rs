//! Typed error enum for the embeddings crate.

use thiserror::Error;

/// Errors from embedding generation operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding client initialization failed: {0}")]
    ClientInit(String),
    #[error("embedding request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("embedding service returned HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("embedding response could not be parsed: {0}")]
    JsonParse(#[source] serde_json::Error),
    #[error("requested {requested} embeddings, service returned {returned}")]
    CountMismatch { requested: usize, returned: usize },
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
