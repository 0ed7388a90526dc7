// Fake service clients shared by unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::embeddings::EmbeddingClient;
use crate::knowledge::{Chunk, KnowledgeBase, KnowledgeBaseMetadata};
use crate::language::Language;
use crate::{RagError, Result};

/// Returns one fixed query vector and counts calls
pub struct SpyEmbedder {
    pub vector: Vec<f32>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl SpyEmbedder {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            vector: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for SpyEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::EmbeddingService("connection refused".to_string()));
        }
        Ok(self.vector.clone())
    }

    fn model_name(&self) -> &str {
        "spy-embedding"
    }
}

/// Replies with a canned completion and records every request
pub struct SpyCompleter {
    reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl SpyCompleter {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("lock not poisoned").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("lock not poisoned").len()
    }
}

#[async_trait]
impl CompletionClient for SpyCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("lock not poisoned")
            .push(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| RagError::CompletionService("rate limited".to_string()))
    }
}

/// Query vector the fixture chunks are scored against
pub const QUERY: [f32; 5] = [1.0, 0.0, 0.0, 0.0, 0.0];

/// With a norm of exactly 100, similarity to [`QUERY`] is `components[0] / 100`
/// with no rounding drift
pub fn chunk_scoring(text: &str, components: [f32; 5]) -> Chunk {
    Chunk {
        text: text.to_string(),
        embedding: components.to_vec(),
    }
}

/// Scores exactly 0.30 against [`QUERY`]
pub fn chunk_at_030(text: &str) -> Chunk {
    chunk_scoring(text, [30.0, 90.0, 30.0, 10.0, 0.0])
}

/// Scores exactly 0.29 against [`QUERY`]
pub fn chunk_at_029(text: &str) -> Chunk {
    chunk_scoring(text, [29.0, 95.0, 11.0, 3.0, 2.0])
}

/// Scores exactly 0.60 against [`QUERY`]
pub fn chunk_at_060(text: &str) -> Chunk {
    chunk_scoring(text, [60.0, 80.0, 0.0, 0.0, 0.0])
}

pub fn knowledge_base(chunks: Vec<Chunk>, language: Language) -> KnowledgeBase {
    KnowledgeBase::build(
        chunks,
        KnowledgeBaseMetadata {
            model_name: "spy-embedding".to_string(),
            language,
            chunk_size: 500,
            chunk_overlap: 50,
            created_at: Utc::now(),
        },
    )
}
