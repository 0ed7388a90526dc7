// Language-completion service boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A single completion call: system + user prompt and sampling bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Opaque `complete(prompt) -> text` service.
///
/// Failures surface as [`crate::RagError::CompletionService`]. No timeout is
/// imposed here; adapters apply the caller-supplied one.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
