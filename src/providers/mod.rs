// Providers module
// External collaborators: embedding generation, text generation and session ids

pub mod ollama;
pub mod openai;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::{ProviderConfig, ProviderMode};

pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;

/// Failure of an external embedding or generation call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API key is not configured for {0}")]
    MissingApiKey(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider task failed: {0}")]
    Task(String),
}

/// Produces an embedding vector for a piece of text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Name of the embedding model, for logs and responses
    fn model_name(&self) -> &str;
}

/// Produces a natural-language completion for a prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}

/// Source of collision-resistant session identifiers
pub trait SessionIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs in their 32 character hex form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSessionIds;

impl SessionIdSource for UuidSessionIds {
    #[inline]
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Embedding and generation clients selected by configuration
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn TextGenerator>,
}

/// Build the provider pair for the configured mode
#[inline]
pub fn build_providers(config: &ProviderConfig) -> anyhow::Result<Providers> {
    match config.mode {
        ProviderMode::Ollama => {
            let client = Arc::new(OllamaClient::new(config)?);
            Ok(Providers {
                embedder: Arc::clone(&client) as Arc<dyn EmbeddingProvider>,
                generator: client,
            })
        }
        ProviderMode::LmStudio | ProviderMode::OpenRouter => {
            let client = Arc::new(OpenAiCompatClient::new(config)?);
            Ok(Providers {
                embedder: Arc::clone(&client) as Arc<dyn EmbeddingProvider>,
                generator: client,
            })
        }
    }
}

/// Map a ureq failure onto the provider error taxonomy
pub(crate) fn classify_ureq_error(error: &ureq::Error) -> ProviderError {
    match error {
        ureq::Error::StatusCode(status) => ProviderError::Http {
            status: *status,
            message: "request rejected by provider".to_string(),
        },
        other => ProviderError::Transport(other.to_string()),
    }
}

/// Whether a failed request is worth another attempt
pub(crate) fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

/// Run a blocking provider call on the blocking pool
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ProviderError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ProviderError::Task(e.to_string()))?
}

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Call `request_fn` until it succeeds, a non-retryable error occurs, or
/// `attempts` is exhausted, sleeping with exponential backoff in between.
pub(crate) fn request_with_retry<F>(
    attempts: u32,
    target: &str,
    mut request_fn: F,
) -> Result<String, ProviderError>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{} to {}", attempt, attempts, target);

        match request_fn() {
            Ok(response_text) => return Ok(response_text),
            Err(error) => {
                if !is_retryable(&error) {
                    warn!("Non-retryable error from {}: {}", target, error);
                    return Err(classify_ureq_error(&error));
                }

                warn!(
                    "Retryable error from {}: {}, attempt {}/{}",
                    target,
                    error,
                    attempt,
                    attempts
                );
                last_error = Some(classify_ureq_error(&error));

                if attempt < attempts {
                    let delay = Duration::from_millis(
                        EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000,
                    );
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed for request to {}", target);
    Err(last_error
        .unwrap_or_else(|| ProviderError::Transport("request failed after retries".to_string())))
}

