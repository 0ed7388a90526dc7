
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, warn};

use super::{PredictionOutcome, PredictionSource};
use crate::Result;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::embeddings::EmbeddingClient;
use crate::knowledge::KnowledgeStore;
use crate::language::Language;
use crate::search::{SearchResult, search};

pub const TOP_K: usize = 3;
/// Inclusive: a top score of exactly this value passes the gate
pub const SIMILARITY_THRESHOLD: f32 = 0.3;
pub const RAG_MAX_TOKENS: u32 = 20;
pub const RAG_TEMPERATURE: f32 = 0.7;

/// How a retrieval-gated attempt ended when nothing failed
#[derive(Debug, Clone, PartialEq)]
pub enum RagAttempt {
    /// No knowledge base is active
    Inactive,
    /// Retrieval found nothing good enough to ground a prediction
    Gated { top_similarity: Option<f32> },
    /// The completion service was consulted
    Completed {
        word: Option<String>,
        top_similarity: f32,
        relevant_chunk_count: usize,
    },
}

impl RagAttempt {
    /// Collapse into the public outcome. Only a completed attempt is attributed to RAG.
    #[inline]
    pub fn into_outcome(self) -> PredictionOutcome {
        match self {
            Self::Inactive => PredictionOutcome::none().with_reasoning("no_knowledge_base"),
            Self::Gated { top_similarity } => PredictionOutcome {
                top_similarity,
                ..PredictionOutcome::none().with_reasoning("below_threshold")
            },
            Self::Completed {
                word,
                top_similarity,
                relevant_chunk_count,
            } => PredictionOutcome {
                word,
                confidence: top_similarity,
                source: PredictionSource::Rag,
                top_similarity: Some(top_similarity),
                relevant_chunk_count,
                reasoning: None,
            },
        }
    }
}

/// Predicts the next word from knowledge retrieved out of the active knowledge base
pub struct RagPredictor {
    embedder: Arc<dyn EmbeddingClient>,
    completer: Arc<dyn CompletionClient>,
    store: KnowledgeStore,
}

impl RagPredictor {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        completer: Arc<dyn CompletionClient>,
        store: KnowledgeStore,
    ) -> Self {
        Self {
            embedder,
            completer,
            store,
        }
    }

    #[inline]
    pub const fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Never fails: any error becomes a `none` outcome, logged with its reason
    #[inline]
    pub async fn predict(
        &self,
        text: &str,
        history: &str,
        language: Language,
    ) -> PredictionOutcome {
        match self.try_predict(text, history, language).await {
            Ok(attempt) => attempt.into_outcome(),
            Err(e) => {
                warn!("Retrieval-gated prediction failed: {}", e);
                PredictionOutcome::none().with_reasoning(format!("error: {}", e))
            }
        }
    }

    /// Same as [`Self::predict`] but keeps the failure reason
    #[inline]
    pub async fn try_predict(
        &self,
        text: &str,
        history: &str,
        language: Language,
    ) -> Result<RagAttempt> {
        // Snapshot so a concurrent load/unload can't change the data mid-query
        let Some(knowledge_base) = self.store.current().await else {
            return Ok(RagAttempt::Inactive);
        };

        let query = self.embedder.embed(text).await?;
        let results = search(&knowledge_base, &query, TOP_K)?;

        let Some(top_similarity) = results.first().map(|r| r.score) else {
            debug!("No chunks to retrieve from");
            return Ok(RagAttempt::Gated {
                top_similarity: None,
            });
        };

        if top_similarity < SIMILARITY_THRESHOLD {
            debug!(
                "Top similarity {:.3} below threshold {}",
                top_similarity, SIMILARITY_THRESHOLD
            );
            return Ok(RagAttempt::Gated {
                top_similarity: Some(top_similarity),
            });
        }

        let policy = language.policy();
        let request = CompletionRequest {
            system_prompt: policy.rag_system_prompt.to_string(),
            user_prompt: build_prompt(&results, text, history, language),
            max_tokens: RAG_MAX_TOKENS,
            temperature: RAG_TEMPERATURE,
        };

        let raw = self.completer.complete(&request).await?;
        let word = policy.extract_word(&raw);
        debug!(
            "RAG prediction {:?} (top similarity {:.3}, {} chunks)",
            word,
            top_similarity,
            results.len()
        );

        Ok(RagAttempt::Completed {
            word,
            top_similarity,
            relevant_chunk_count: results.len(),
        })
    }
}

/// Retrieved chunks first, then history, then what the speaker just said
fn build_prompt(results: &[SearchResult], text: &str, history: &str, language: Language) -> String {
    let policy = language.policy();
    let knowledge = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, r.text))
        .join("\n");

    let mut prompt = format!("{}:\n{}\n\n", policy.knowledge_label, knowledge);
    if !history.trim().is_empty() {
        prompt.push_str(policy.history_label);
        prompt.push_str(":\n");
        prompt.push_str(history.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(policy.context_label);
    prompt.push_str(": ");
    prompt.push_str(text);
    prompt
}
