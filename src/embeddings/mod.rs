// Embeddings module
// Chunking of source documents and the embedding service boundary

pub mod chunking;

pub use chunking::{ChunkingConfig, chunk_text};

use async_trait::async_trait;

use crate::Result;

/// Text-embedding service boundary.
///
/// Pure request/response: implementations hold no per-query state and never
/// cache, so identical query texts are embedded again on every call. Failures
/// surface as [`crate::RagError::EmbeddingService`]; retry policy belongs to
/// the caller.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text into a vector of the deployment's fixed dimensionality
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Name of the embedding model, recorded in built knowledge bases
    fn model_name(&self) -> &str;
}
