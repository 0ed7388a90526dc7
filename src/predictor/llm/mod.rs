
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::DUPLICATE_AVOIDED;
use crate::Result;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::CompletionConfig;
use crate::language::Language;

const UNSTRUCTURED_REPLY: &str = "unstructured_response";

/// Output of the plain predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PlainPrediction {
    pub word: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

/// Prediction without retrieval, from context and conversation history alone
#[async_trait]
pub trait PlainPredictor: Send + Sync {
    async fn predict(&self, text: &str, history: &str, language: Language)
    -> Result<PlainPrediction>;
}

#[derive(Debug, Deserialize)]
struct StructuredReply {
    word: Option<String>,
    confidence: Option<f32>,
    reasoning: Option<String>,
}

/// Plain predictor backed by a completion service that answers in JSON
pub struct LlmPredictor {
    completer: Arc<dyn CompletionClient>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmPredictor {
    #[inline]
    pub fn new(completer: Arc<dyn CompletionClient>, config: &CompletionConfig) -> Self {
        Self {
            completer,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl PlainPredictor for LlmPredictor {
    async fn predict(
        &self,
        text: &str,
        history: &str,
        language: Language,
    ) -> Result<PlainPrediction> {
        let policy = language.policy();
        let mut user_prompt = String::new();
        if !history.trim().is_empty() {
            user_prompt.push_str(policy.history_label);
            user_prompt.push_str(":\n");
            user_prompt.push_str(history.trim());
            user_prompt.push_str("\n\n");
        }
        user_prompt.push_str(policy.context_label);
        user_prompt.push_str(": ");
        user_prompt.push_str(text);

        let request = CompletionRequest {
            system_prompt: policy.plain_system_prompt.to_string(),
            user_prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let raw = self.completer.complete(&request).await?;
        let prediction = parse_reply(&raw, language);
        Ok(suppress_duplicate(prediction, text, language))
    }
}

/// Read a JSON reply, tolerating code fences and surrounding prose
fn parse_reply(raw: &str, language: Language) -> PlainPrediction {
    let structured = raw
        .find('{')
        .zip(raw.rfind('}'))
        .and_then(|(start, end)| raw.get(start..=end))
        .and_then(|json| serde_json::from_str::<StructuredReply>(json).ok());

    match structured {
        Some(reply) => PlainPrediction {
            word: reply
                .word
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty()),
            confidence: reply.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            reasoning: reply.reasoning.unwrap_or_default(),
        },
        None => {
            debug!("Completion was not JSON, extracting word from raw text");
            PlainPrediction {
                word: language.policy().extract_word(raw),
                confidence: 0.0,
                reasoning: UNSTRUCTURED_REPLY.to_string(),
            }
        }
    }
}

/// Drop a prediction that only repeats the speaker's last word
fn suppress_duplicate(
    prediction: PlainPrediction,
    text: &str,
    language: Language,
) -> PlainPrediction {
    let Some(word) = prediction.word.as_deref() else {
        return prediction;
    };
    let Some(last_word) = language.policy().last_word(text) else {
        return prediction;
    };

    if last_word.contains(word) {
        debug!("Suppressing '{}', already the last word of '{}'", word, last_word);
        return PlainPrediction {
            word: None,
            confidence: 0.0,
            reasoning: DUPLICATE_AVOIDED.to_string(),
        };
    }

    prediction
}
