//! Session persistence adapter.
//!
//! The engine depends on the [`SessionStore`] contract, never on a
//! concrete backend. `save` failures are reported, not fatal: the
//! in-memory transition stands and the turn result carries a
//! persistence-degraded advisory instead.
//!
//! Backends: [`MemoryStore`] (tests and single-process deployments),
//! [`NullStore`] (ephemeral demo sessions), and [`sqlite::SqliteStore`].

pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::engine::context::{Message, Session, TreatmentContext};
use crate::errors::StoreError;

/// The durable unit: everything needed to resume a session from cold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: Session,
    pub context: TreatmentContext,
    #[serde(default)]
    pub message_log: Vec<Message>,
}

impl SessionRecord {
    pub fn new(session: Session, context: TreatmentContext, message_log: Vec<Message>) -> Self {
        Self {
            session,
            context,
            message_log,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }
}

/// Save/load contract the engine depends on.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;
    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError>;
    /// Delete is idempotent: removing an absent record succeeds.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

/// In-process store backed by a map. The default backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.session_id().to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        self.records
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.records.write().await.remove(session_id);
        Ok(())
    }
}

/// No-op store for sessions that should leave no trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn save(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        Err(StoreError::NotFound {
            session_id: session_id.to_string(),
        })
    }

    async fn delete(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
