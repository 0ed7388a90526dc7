// Per-turn choice between retrieval-gated and plain prediction


use std::sync::Arc;

use tracing::{debug, warn};

use crate::knowledge::KnowledgeStore;
use crate::language::Language;
use crate::predictor::{PlainPredictor, PredictionOutcome, PredictionSource, RagPredictor};

/// Tries retrieval first while a knowledge base is active, otherwise (or when retrieval
/// yields no word) asks the plain predictor. Holds no state of its own beyond the
/// store's loaded/unloaded status.
pub struct PredictionSelector {
    rag: RagPredictor,
    plain: Arc<dyn PlainPredictor>,
}

impl PredictionSelector {
    #[inline]
    pub fn new(rag: RagPredictor, plain: Arc<dyn PlainPredictor>) -> Self {
        Self { rag, plain }
    }

    #[inline]
    pub const fn store(&self) -> &KnowledgeStore {
        self.rag.store()
    }

    /// Never fails; `source = none` means nothing should be spoken this turn
    #[inline]
    pub async fn select(&self, text: &str, history: &str, language: Language) -> PredictionOutcome {
        if self.store().is_loaded().await {
            let outcome = self.rag.predict(text, history, language).await;
            if outcome.has_word() {
                return outcome;
            }
            debug!(
                "Retrieval produced no word ({}), falling back to plain prediction",
                outcome.reasoning.as_deref().unwrap_or("empty completion")
            );
        }

        match self.plain.predict(text, history, language).await {
            Ok(prediction) if prediction.word.is_some() => PredictionOutcome {
                word: prediction.word,
                confidence: prediction.confidence,
                source: PredictionSource::Llm,
                top_similarity: None,
                relevant_chunk_count: 0,
                reasoning: Some(prediction.reasoning),
            },
            Ok(prediction) => PredictionOutcome::none().with_reasoning(prediction.reasoning),
            Err(e) => {
                warn!("Plain prediction failed: {}", e);
                PredictionOutcome::none().with_reasoning(format!("error: {}", e))
            }
        }
    }
}
