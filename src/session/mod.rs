// Speech session loop state
// Finalized utterances feed a rolling history; each one triggers a prediction turn


use std::collections::VecDeque;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info};

use crate::language::Language;
use crate::predictor::PredictionOutcome;
use crate::selector::PredictionSelector;

pub const DEFAULT_HISTORY_TURNS: usize = 10;

/// Bounded window of the most recent finalized utterances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: VecDeque<String>,
    capacity: usize,
}

impl Default for ConversationHistory {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TURNS)
    }
}

impl ConversationHistory {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an utterance, dropping the oldest once full. Blank text is ignored.
    #[inline]
    pub fn push(&mut self, utterance: &str) {
        let utterance = utterance.trim();
        if utterance.is_empty() || self.capacity == 0 {
            return;
        }
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(utterance.to_string());
    }

    /// Oldest first, one utterance per line
    #[inline]
    pub fn format(&self) -> String {
        self.turns.iter().join("\n")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

pub struct PredictionSession {
    language: Language,
    history: ConversationHistory,
    selector: Arc<PredictionSelector>,
}

impl PredictionSession {
    #[inline]
    pub fn new(selector: Arc<PredictionSelector>, language: Language) -> Self {
        Self {
            language,
            history: ConversationHistory::default(),
            selector,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = ConversationHistory::new(capacity);
        self
    }

    #[inline]
    pub const fn language(&self) -> Language {
        self.language
    }

    #[inline]
    pub fn set_language(&mut self, language: Language) {
        if language != self.language {
            info!("Session language changed to {}", language);
            self.language = language;
        }
    }

    #[inline]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[inline]
    pub fn selector(&self) -> &PredictionSelector {
        &self.selector
    }

    /// Whether an interim transcript is long enough to be worth predicting on
    #[inline]
    pub fn should_predict_interim(&self, text: &str) -> bool {
        self.language.policy().meets_interim_length(text)
    }

    /// Predict from an interim transcript without recording it
    #[inline]
    pub async fn predict_interim(&self, text: &str) -> Option<PredictionOutcome> {
        if !self.should_predict_interim(text) {
            return None;
        }
        Some(
            self.selector
                .select(text.trim(), &self.history.format(), self.language)
                .await,
        )
    }

    /// Predict from a finalized utterance, then record it in the history
    ///
    /// The prediction sees only the history before this utterance. A `none` outcome
    /// is a normal turn where nothing is spoken.
    #[inline]
    pub async fn handle_final_utterance(&mut self, text: &str) -> PredictionOutcome {
        let text = text.trim();
        if text.is_empty() {
            return PredictionOutcome::none();
        }

        let outcome = self
            .selector
            .select(text, &self.history.format(), self.language)
            .await;
        self.history.push(text);

        debug!(
            "Turn {}: {} -> {:?}",
            self.history.len(),
            outcome.source,
            outcome.word
        );
        outcome
    }
}
