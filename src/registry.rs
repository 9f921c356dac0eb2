//! Session registry: the live-session map.
//!
//! One [`SessionState`] exists per active session, behind its own
//! `tokio::sync::Mutex`. Process and undo hold that mutex for the full
//! read-modify-write, so at most one transition is ever in flight per
//! session id while distinct sessions run in parallel. The registry is a
//! cache over the persistence adapter, not the durable record.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::engine::context::{Message, Session, TreatmentContext};
use crate::errors::EngineError;
use crate::history::StepHistory;

/// Everything the engine mutates for one session.
#[derive(Debug)]
pub struct SessionState {
    pub session: Session,
    pub context: TreatmentContext,
    pub message_log: Vec<Message>,
    pub history: StepHistory,
}

impl SessionState {
    pub fn new(session: Session, context: TreatmentContext, max_history: usize) -> Self {
        Self {
            session,
            context,
            message_log: Vec::new(),
            history: StepHistory::bounded(max_history),
        }
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

/// Concurrent map of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brand-new session. Fails if the id is already live.
    pub async fn create(&self, state: SessionState) -> Result<SharedSession, EngineError> {
        let session_id = state.session.session_id.clone();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(EngineError::SessionExists { session_id });
        }
        let shared = Arc::new(Mutex::new(state));
        sessions.insert(session_id, shared.clone());
        Ok(shared)
    }

    /// Register a session rehydrated from the store. When another task
    /// already rehydrated the same id, the existing entry wins.
    pub async fn adopt(&self, state: SessionState) -> SharedSession {
        let session_id = state.session.session_id.clone();
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(state)))
            .clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(session_id)
    }

    /// Snapshot of the live entries, for listings.
    pub async fn entries(&self) -> Vec<(String, SharedSession)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, shared)| (id.clone(), shared.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions whose last activity is older than `idle_after`.
    /// Sessions with an in-flight turn hold their mutex and are skipped.
    /// Returns the number of sessions evicted.
    pub async fn evict_idle(&self, idle_after: Duration) -> usize {
        let cutoff = Utc::now() - idle_after;
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, shared) in sessions.iter() {
                let Ok(state) = shared.try_lock() else {
                    continue;
                };
                if state.context.last_activity < cutoff {
                    stale.push(id.clone());
                }
            }
        }
        if stale.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;
        for id in stale {
            if sessions.remove(&id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}
