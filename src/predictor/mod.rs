// Next-word predictors
// rag: retrieval-gated prediction over the active knowledge base
// llm: plain prediction from context and conversation history

pub mod llm;
pub mod rag;


use std::fmt;

use serde::Serialize;

pub use llm::{LlmPredictor, PlainPrediction, PlainPredictor};
pub use rag::{RagAttempt, RagPredictor};

/// Reasoning reported when a plain prediction merely echoed the speaker's last word
pub const DUPLICATE_AVOIDED: &str = "duplicate_avoided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Rag,
    Llm,
    None,
}

impl fmt::Display for PredictionSource {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Rag => write!(f, "rag"),
            Self::Llm => write!(f, "llm"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Result of one prediction turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionOutcome {
    pub word: Option<String>,
    pub confidence: f32,
    pub source: PredictionSource,
    pub top_similarity: Option<f32>,
    pub relevant_chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl PredictionOutcome {
    /// Nothing to say this turn
    #[inline]
    pub const fn none() -> Self {
        Self {
            word: None,
            confidence: 0.0,
            source: PredictionSource::None,
            top_similarity: None,
            relevant_chunk_count: 0,
            reasoning: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    #[inline]
    pub const fn has_word(&self) -> bool {
        self.word.is_some()
    }
}

impl Default for PredictionOutcome {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}
