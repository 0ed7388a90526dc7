
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::RagError;
use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::Config;
use crate::embeddings::EmbeddingClient;

/// One attempt only: retrying is the caller's decision
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for an OpenAI-compatible embeddings + chat completions API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: Option<String>,
    embedding_model: String,
    completion_model: String,
    embedding_dimension: Option<usize>,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .service_url()
            .context("Failed to generate service URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.service.timeout()))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.service.api_key(),
            embedding_model: config.embedding.model.clone(),
            completion_model: config.completion.model.clone(),
            embedding_dimension: Some(config.embedding.embedding_dimension as usize),
            agent,
            retry_attempts: config.service.retry_attempts.max(DEFAULT_RETRY_ATTEMPTS),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Accept embeddings of any dimensionality (or enforce a specific one)
    #[inline]
    pub fn with_embedding_dimension(mut self, dimension: Option<usize>) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Test connection to the service and verify the configured models exist
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for service at {}", self.base_url);

        let models = self.list_models().context("Failed to list models")?;

        for model in [&self.embedding_model, &self.completion_model] {
            if !models.iter().any(|m| &m.id == model) {
                let available: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    model, available
                );
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available
                ));
            }
        }

        info!(
            "Health check passed for service at {} (embedding: {}, completion: {})",
            self.base_url, self.embedding_model, self.completion_model
        );
        Ok(())
    }

    /// List all models the service exposes
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/v1/models")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                let mut request = self.agent.get(url.as_str());
                if let Some(key) = &self.api_key {
                    request = request.header("Authorization", format!("Bearer {}", key));
                }
                request
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.data.len());
        Ok(models_response.data)
    }

    /// Generate an embedding for a single text input
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: text,
        };

        let url = self
            .base_url
            .join("/v1/embeddings")
            .context("Failed to build embedding URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .make_request_with_retry(|| self.post_json(&url, &request_json))
            .context("Failed to generate embedding")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        let embedding = embed_response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .context("Embedding response contained no vectors")?;

        if let Some(expected) = self.embedding_dimension {
            if embedding.len() != expected {
                return Err(anyhow::anyhow!(
                    "Embedding has {} dimensions, expected {}",
                    embedding.len(),
                    expected
                ));
            }
        }

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Run a chat completion and return the first choice's text
    #[inline]
    pub fn generate_completion(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            "Requesting completion (max_tokens: {}, temperature: {})",
            request.max_tokens, request.temperature
        );

        let chat_request = ChatRequest {
            model: &self.completion_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = self
            .base_url
            .join("/v1/chat/completions")
            .context("Failed to build completion URL")?;

        let request_json = serde_json::to_string(&chat_request)
            .context("Failed to serialize completion request")?;

        let response_text = self
            .make_request_with_retry(|| self.post_json(&url, &request_json))
            .context("Failed to generate completion")?;

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion response contained no choices")?;

        Ok(content.trim().to_string())
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String, ureq::Error> {
        let mut request = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        request
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| RagError::EmbeddingService(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::EmbeddingService(format!("{:#}", e)))
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> crate::Result<String> {
        let client = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || client.generate_completion(&request))
            .await
            .map_err(|e| RagError::CompletionService(format!("Completion task failed: {}", e)))?
            .map_err(|e| RagError::CompletionService(format!("{:#}", e)))
    }
}
