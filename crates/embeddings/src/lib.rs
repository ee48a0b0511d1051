//! Embedding generation for pgvector columns
//!
//! The model itself is an external service; this crate only knows how to ask
//! it for vectors and check their shape.

mod client;
pub mod error;

use async_trait::async_trait;

pub use client::HttpEmbeddingProvider;
pub use error::EmbeddingError;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension every returned vector must have.
    fn dimension(&self) -> usize;
}
