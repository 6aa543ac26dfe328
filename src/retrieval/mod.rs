// Retrieval engine
// Ranks the chunks of one session against a query vector

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::ingestion::chunking::Chunk;
use crate::session::SessionStore;
use crate::vector::cosine_similarity;

/// Number of chunks returned when the caller does not ask for a specific count
pub const DEFAULT_TOP_K: usize = 4;

/// A chunk scored against a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub chunk: Chunk,
    pub similarity: f32,
    /// 0-based position in the ranking
    pub rank_index: usize,
    /// Position of the chunk within its session
    pub chunk_index: usize,
}

#[derive(Clone)]
pub struct RetrievalEngine {
    store: Arc<SessionStore>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    #[inline]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Top `top_k` chunks of a session by cosine similarity to `query`.
    ///
    /// Ties keep chunk order. An absent or expired session yields no results;
    /// use [`Self::try_search`] to tell that apart from an empty document.
    /// `top_k` is not clamped here.
    #[inline]
    pub fn search(&self, query: &[f32], session_id: &str, top_k: usize) -> Vec<RankedResult> {
        self.try_search(query, session_id, top_k).unwrap_or_default()
    }

    /// Like [`Self::search`], but `None` when the session is absent or expired
    /// at the moment of ranking
    #[inline]
    pub fn try_search(
        &self,
        query: &[f32],
        session_id: &str,
        top_k: usize,
    ) -> Option<Vec<RankedResult>> {
        let Some(session) = self.store.get(session_id) else {
            debug!("Search against missing session {}", session_id);
            return None;
        };

        let mut scored: Vec<(usize, f32)> = session
            .embeddings
            .iter()
            .enumerate()
            .map(|(index, embedding)| (index, cosine_similarity(query, embedding)))
            .collect();

        scored.sort_by(|a, b| compare_scores(*a, *b));

        let results: Vec<RankedResult> = scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .filter_map(|(rank_index, (chunk_index, similarity))| {
                session.chunks.get(chunk_index).map(|chunk| RankedResult {
                    chunk: chunk.clone(),
                    similarity,
                    rank_index,
                    chunk_index,
                })
            })
            .collect();

        debug!(
            "Ranked {} chunks of session {}, returning {}",
            session.chunk_count(),
            session_id,
            results.len()
        );

        Some(results)
    }
}

/// Similarity descending, then chunk index ascending
fn compare_scores(a: (usize, f32), b: (usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}
