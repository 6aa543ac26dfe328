//! Client for OpenAI-compatible endpoints (LM Studio, OpenRouter).


use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingProvider, ProviderError, TextGenerator, request_with_retry, run_blocking};
use crate::config::{ProviderConfig, ProviderMode};

const OPENROUTER_TITLE: &str = "doc-qa";

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    embedding_model: String,
    generation_model: String,
    api_key: Option<String>,
    send_title: bool,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
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
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiCompatClient {
    /// Builds a client for the configured OpenAI-compatible endpoint.
    ///
    /// OpenRouter refuses anonymous requests, so a missing key is an error in
    /// that mode; LM Studio runs locally and takes an optional key.
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config
            .endpoint_url()
            .context("Failed to parse provider endpoint from config")?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let api_key = config.api_key.clone().filter(|key| !key.trim().is_empty());
        if config.mode == ProviderMode::OpenRouter && api_key.is_none() {
            return Err(ProviderError::MissingApiKey("openrouter".to_string()).into());
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            api_key,
            send_title: config.mode == ProviderMode::OpenRouter,
            temperature: config.temperature,
            agent,
            retry_attempts: config.retry_attempts,
        })
    }

    /// Embeds one input via `POST {base}/embeddings`.
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let body = serde_json::to_string(&EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        })
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let response_text = self.post_json("embeddings", &body)?;
        let parsed: EmbeddingResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse embedding response: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("embedding response contained no data".to_string())
            })
    }

    /// Sends a single-turn chat completion via `POST {base}/chat/completions`.
    #[inline]
    pub fn generate_blocking(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Generating completion for prompt (length: {})", prompt.len());

        let body = serde_json::to_string(&ChatRequest {
            model: &self.generation_model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        })
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let response_text = self.post_json("chat/completions", &body)?;
        let parsed: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse chat response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("chat response contained no choices".to_string())
            })
    }

    fn post_json(&self, route: &str, body: &str) -> Result<String, ProviderError> {
        let url = format!("{}/{}", self.base_url, route);
        let authorization = self.api_key.as_ref().map(|key| format!("Bearer {}", key.trim()));

        request_with_retry(self.retry_attempts, &url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(value) = &authorization {
                request = request.header("Authorization", value.as_str());
            }
            if self.send_title {
                request = request.header("X-Title", OPENROUTER_TITLE);
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatClient {
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
impl TextGenerator for OpenAiCompatClient {
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
