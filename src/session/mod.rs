// Session store
// In-memory, process-lifetime storage for ingested documents with lazy expiry

pub mod clock;


use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use crate::ingestion::chunking::Chunk;
use crate::{QaError, Result};

pub use clock::{Clock, ManualClock, SystemClock};

/// Default session lifetime when none is configured
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

/// One embedding vector per chunk
pub type EmbeddingVector = Vec<f32>;

/// An ingested document bound to an identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
    /// Index-aligned with `chunks`
    pub embeddings: Vec<EmbeddingVector>,
}

/// Payload for [`SessionStore::put`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub filename: String,
    /// Stamped with the store's clock when unset
    pub created_at: Option<DateTime<Utc>>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<EmbeddingVector>,
}

impl Session {
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Keyed store of sessions.
///
/// Every operation holds the map lock for its whole duration, so a reader can
/// never observe chunks and embeddings of different lengths, and a read that
/// finds an expired entry evicts it before anyone else can see it.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    expiry: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create a store backed by the system clock
    #[inline]
    pub fn new(expiry: Duration) -> Self {
        Self::with_clock(expiry, Arc::new(SystemClock))
    }

    #[inline]
    pub fn with_clock(expiry: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            expiry: TimeDelta::from_std(expiry).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    #[inline]
    pub fn expiry(&self) -> TimeDelta {
        self.expiry
    }

    /// Look up a live session, evicting it if it has expired
    #[inline]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.lock();
        self.live_entry(&mut sessions, id).cloned()
    }

    /// Whether a live session exists under `id`
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert or fully replace the session stored under `id`
    #[inline]
    pub fn put(&self, id: impl Into<String>, data: SessionData) -> Result<Arc<Session>> {
        let id = id.into();

        if data.chunks.len() != data.embeddings.len() {
            return Err(QaError::Validation(format!(
                "session {} has {} chunks but {} embeddings",
                id,
                data.chunks.len(),
                data.embeddings.len()
            )));
        }

        let session = Arc::new(Session {
            id: id.clone(),
            filename: data.filename,
            created_at: data.created_at.unwrap_or_else(|| self.clock.now()),
            chunks: data.chunks,
            embeddings: data.embeddings,
        });

        debug!(
            "Storing session {} ({} chunks)",
            id,
            session.chunk_count()
        );
        self.lock().insert(id, Arc::clone(&session));

        Ok(session)
    }

    /// Remove a session; returns whether anything was removed
    #[inline]
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!("Deleted session {}", id);
        }
        removed
    }

    /// Replace the embeddings of a live session, keeping every other field
    #[inline]
    pub fn set_embeddings(&self, id: &str, embeddings: Vec<EmbeddingVector>) -> Result<()> {
        let mut sessions = self.lock();

        let Some(current) = self.live_entry(&mut sessions, id) else {
            return Err(QaError::SessionNotFound(id.to_string()));
        };

        if current.chunks.len() != embeddings.len() {
            return Err(QaError::Validation(format!(
                "session {} has {} chunks but {} embeddings were supplied",
                id,
                current.chunks.len(),
                embeddings.len()
            )));
        }

        let updated = Arc::new(Session {
            embeddings,
            ..Session::clone(current)
        });
        sessions.insert(id.to_string(), updated);

        Ok(())
    }

    /// Embeddings of a live session
    #[inline]
    pub fn embeddings(&self, id: &str) -> Option<Vec<EmbeddingVector>> {
        self.get(id).map(|session| session.embeddings.clone())
    }

    /// Number of stored entries, including expired ones not yet evicted
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, session: &Session) -> bool {
        self.clock.now() - session.created_at > self.expiry
    }

    fn live_entry<'a>(
        &self,
        sessions: &'a mut HashMap<String, Arc<Session>>,
        id: &str,
    ) -> Option<&'a Arc<Session>> {
        let expired = self.is_expired(sessions.get(id)?);
        if expired {
            debug!("Session {} expired, evicting", id);
            sessions.remove(id);
            return None;
        }
        sessions.get(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY)
    }
}
