
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{EmbeddingProvider, ProviderError, TextGenerator, request_with_retry, run_blocking};
use crate::config::ProviderConfig;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
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
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config
            .endpoint_url()
            .context("Failed to parse Ollama endpoint from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            agent,
            retry_attempts: config.retry_attempts,
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
        self.retry_attempts = attempts;
        self
    }

    /// Test connection to the Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;
        for wanted in [&self.embedding_model, &self.generation_model] {
            if !models.iter().any(|m| &m.name == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                anyhow::bail!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                );
            }
        }

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// List all models installed on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = request_with_retry(self.retry_attempts, url.as_str(), || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate an embedding for a single text, blocking the current thread
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("/api/embed")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.embedding_model,
            input: text,
        })
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let response_text = self.post_json(&url, &request_json)?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse embedding response: {}", e))
        })?;

        let embedding = response.embeddings.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("embedding response contained no vectors".to_string())
        })?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Generate a completion for a prompt, blocking the current thread
    #[inline]
    pub fn generate_blocking(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Generating completion for prompt (length: {})", prompt.len());

        let url = self.endpoint("/api/generate")?;
        let request_json = serde_json::to_string(&GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        })
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let response_text = self.post_json(&url, &request_json)?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse generate response: {}", e))
        })?;

        Ok(response.response)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String, ProviderError> {
        request_with_retry(self.retry_attempts, url.as_str(), || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let client = self.clone();
        let text = text.to_string();
        run_blocking(move || client.embed_blocking(&text)).await
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    #[inline]
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let client = self.clone();
        let prompt = prompt.to_string();
        run_blocking(move || client.generate_blocking(&prompt)).await
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.generation_model
    }
}
