// Ingestion pipeline
// Turns an uploaded document into a stored session: chunk, embed, write once

pub mod chunking;


use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Config;
use crate::providers::{EmbeddingProvider, ProviderError, SessionIdSource};
use crate::session::{EmbeddingVector, Session, SessionData, SessionStore};
use crate::vector::zero_vector;

pub use chunking::{Chunk, ChunkingConfig, chunk_text, chunk_with_config};

/// Result of embedding a single chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEmbedding {
    pub chunk_id: String,
    pub outcome: std::result::Result<EmbeddingVector, ProviderError>,
}

/// What ended up stored for a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingOutcome {
    Embedded,
    /// A zero vector was stored because embedding failed
    Fallback { cause: ProviderError },
}

impl EmbeddingOutcome {
    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Summary of one ingestion
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub session: Arc<Session>,
    /// Aligned with `session.chunks`
    pub outcomes: Vec<EmbeddingOutcome>,
}

impl IngestionReport {
    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    #[inline]
    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }
}

pub struct IngestionPipeline {
    store: Arc<SessionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    ids: Arc<dyn SessionIdSource>,
    chunking: ChunkingConfig,
    dimension: usize,
    max_concurrency: usize,
    timeout: Duration,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(
        store: Arc<SessionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        ids: Arc<dyn SessionIdSource>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            embedder,
            ids,
            chunking: config.chunking,
            dimension: config.provider.dimension(),
            max_concurrency: config.provider.max_concurrency,
            timeout: config.provider.timeout(),
        }
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    #[inline]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed every chunk, at most `max_concurrency` calls in flight.
    ///
    /// Output order matches `chunks` regardless of completion order. Each call
    /// is bounded by the configured timeout, and a vector whose length is not
    /// the configured dimension counts as a failed call.
    #[inline]
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> Vec<ChunkEmbedding> {
        let concurrency = self.max_concurrency.max(1);
        debug!(
            "Embedding {} chunks with up to {} concurrent requests",
            chunks.len(),
            concurrency
        );

        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| async move {
                ChunkEmbedding {
                    chunk_id: chunk.id.clone(),
                    outcome: self.embed_one(&chunk.text).await,
                }
            })
            .collect();

        stream::iter(pending)
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn embed_one(&self, text: &str) -> std::result::Result<EmbeddingVector, ProviderError> {
        let vector = tokio::time::timeout(self.timeout, self.embedder.embed(text))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        if vector.len() != self.dimension {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    /// Chunk, embed and store a document under a fresh session id.
    ///
    /// Chunks whose embedding fails are stored with a zero vector, so the
    /// session always holds one vector per chunk. Nothing is written until
    /// every chunk has an outcome.
    #[inline]
    pub async fn ingest(&self, filename: &str, text: &str) -> Result<IngestionReport> {
        let chunks = chunk_with_config(text, &self.chunking)?;
        let results = self.embed_chunks(&chunks).await;

        let mut embeddings = Vec::with_capacity(results.len());
        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            match result.outcome {
                Ok(vector) => {
                    embeddings.push(vector);
                    outcomes.push(EmbeddingOutcome::Embedded);
                }
                Err(cause) => {
                    warn!(
                        "Embedding failed for {} of {}, storing zero vector: {}",
                        result.chunk_id, filename, cause
                    );
                    embeddings.push(zero_vector(self.dimension));
                    outcomes.push(EmbeddingOutcome::Fallback { cause });
                }
            }
        }

        let session_id = self.ids.next_id();
        let session = self.store.put(
            session_id,
            SessionData {
                filename: filename.to_string(),
                created_at: None,
                chunks,
                embeddings,
            },
        )?;

        let report = IngestionReport { session, outcomes };
        info!(
            "Ingested {} into session {} ({} chunks, {} fallbacks)",
            filename,
            report.session_id(),
            report.session.chunk_count(),
            report.fallback_count()
        );

        Ok(report)
    }
}
