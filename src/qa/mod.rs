// Question answering service
// Upload and ask flows on top of the ingestion pipeline and retrieval engine


use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, RetrievalConfig};
use crate::ingestion::IngestionPipeline;
use crate::providers::{
    EmbeddingProvider, ProviderError, Providers, SessionIdSource, TextGenerator, UuidSessionIds,
};
use crate::retrieval::{RankedResult, RetrievalEngine};
use crate::session::{Session, SessionStore};
use crate::{QaError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub session_id: String,
    pub filename: String,
    pub num_chunks: usize,
    pub approx_chars: usize,
    /// Chunks stored with a zero vector because embedding failed
    pub fallback_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub session_id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: String,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub used_model: String,
    /// Time spent in the generation call
    pub latency_ms: u64,
}

pub struct QaService {
    store: Arc<SessionStore>,
    pipeline: IngestionPipeline,
    engine: RetrievalEngine,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    retrieval: RetrievalConfig,
    timeout: Duration,
}

impl QaService {
    /// Service with a fresh store and random session ids
    #[inline]
    pub fn new(config: &Config, providers: Providers) -> Self {
        let store = Arc::new(SessionStore::new(config.session.expiry()));
        Self::from_parts(config, store, providers, Arc::new(UuidSessionIds))
    }

    #[inline]
    pub fn from_parts(
        config: &Config,
        store: Arc<SessionStore>,
        providers: Providers,
        ids: Arc<dyn SessionIdSource>,
    ) -> Self {
        let pipeline = IngestionPipeline::new(
            Arc::clone(&store),
            Arc::clone(&providers.embedder),
            ids,
            config,
        );
        let engine = RetrievalEngine::new(Arc::clone(&store));

        Self {
            store,
            pipeline,
            engine,
            embedder: providers.embedder,
            generator: providers.generator,
            retrieval: config.retrieval,
            timeout: config.provider.timeout(),
        }
    }

    #[inline]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[inline]
    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Ingest extracted document text into a new session
    #[inline]
    pub async fn upload(&self, filename: &str, text: &str) -> Result<UploadSummary> {
        if filename.trim().is_empty() {
            return Err(QaError::Validation("filename is required".to_string()));
        }

        let report = self.pipeline.ingest(filename, text).await?;

        Ok(UploadSummary {
            session_id: report.session_id().to_string(),
            filename: filename.to_string(),
            num_chunks: report.session.chunk_count(),
            approx_chars: text.chars().count(),
            fallback_chunks: report.fallback_count(),
        })
    }

    /// Answer a question from the chunks of an existing session
    #[inline]
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let top_k = self.validate_top_k(request.top_k)?;
        self.validate_question(&request.question)?;

        let ranked = self
            .search(&request.session_id, &request.question, top_k)
            .await?;

        let sources = ranked
            .iter()
            .map(|result| Source {
                chunk_id: result.chunk.id.clone(),
                score: result.similarity,
                snippet: snippet(&result.chunk.text, self.retrieval.snippet_chars),
            })
            .collect();

        let prompt = build_prompt(&ranked, &request.question);
        debug!("Prompt built from {} chunks", ranked.len());

        let started = Instant::now();
        let answer = self.bounded(self.generator.generate(&prompt)).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Answered question for session {} in {} ms",
            request.session_id, latency_ms
        );

        Ok(AskResponse {
            answer,
            sources,
            used_model: self.generator.model_name().to_string(),
            latency_ms,
        })
    }

    /// Rank a session's chunks against `query` without generating an answer.
    ///
    /// Fails with [`QaError::SessionNotFound`] before any provider call when the
    /// session is absent or expired, and again if it expires during that call.
    #[inline]
    pub async fn search(
        &self,
        session_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RankedResult>> {
        if session_id.trim().is_empty() {
            return Err(QaError::Validation("session_id is required".to_string()));
        }
        if !self.store.contains(session_id) {
            return Err(QaError::SessionNotFound(session_id.to_string()));
        }

        let query_vector = self.bounded(self.embedder.embed(query)).await?;

        // The session may have expired while the query was being embedded
        self.engine
            .try_search(&query_vector, session_id, top_k)
            .ok_or_else(|| QaError::SessionNotFound(session_id.to_string()))
    }

    #[inline]
    pub fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.store
            .get(session_id)
            .ok_or_else(|| QaError::SessionNotFound(session_id.to_string()))
    }

    /// Returns whether a session was removed
    #[inline]
    pub fn delete_session(&self, session_id: &str) -> bool {
        self.store.delete(session_id)
    }

    /// Resolve the requested top-k, rejecting values outside `1..=max_top_k`
    #[inline]
    pub fn validate_top_k(&self, top_k: Option<i64>) -> Result<usize> {
        let Some(requested) = top_k else {
            return Ok(self.retrieval.default_top_k);
        };

        usize::try_from(requested)
            .ok()
            .filter(|k| (1..=self.retrieval.max_top_k).contains(k))
            .ok_or_else(|| {
                QaError::Validation(format!(
                    "top_k must be between 1 and {}, got {}",
                    self.retrieval.max_top_k, requested
                ))
            })
    }

    fn validate_question(&self, question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(QaError::Validation("question is required".to_string()));
        }
        let length = question.chars().count();
        if length > self.retrieval.max_question_chars {
            return Err(QaError::Validation(format!(
                "question must be at most {} characters, got {}",
                self.retrieval.max_question_chars, length
            )));
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, ProviderError>
    where
        T: Send,
        F: Future<Output = std::result::Result<T, ProviderError>> + Send,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}

/// Grounding prompt for the generator
#[inline]
pub fn build_prompt(ranked: &[RankedResult], question: &str) -> String {
    let context = ranked
        .iter()
        .map(|result| result.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the question: {question}"
    )
}

/// First `max_chars` characters of `text`, with `...` appended when cut
#[inline]
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", text.get(..byte).unwrap_or_default()),
        None => text.to_string(),
    }
}
