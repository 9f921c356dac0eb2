//! SQLite-backed session store.
//!
//! Records are stored as one JSON blob per session. All database access
//! runs on tokio's blocking thread pool via `spawn_blocking`, so
//! synchronous SQLite I/O never ties up async worker threads.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::{SessionRecord, SessionStore};
use crate::errors::StoreError;

/// Synchronous connection owner. Wrapped by [`SqliteStore`] for async use.
pub struct SessionDb {
    conn: Connection,
}

impl SessionDb {
    /// Open (or create) the database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// In-memory database, for tests.
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    session_id TEXT PRIMARY KEY,
                    record TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );",
            )
            .context("Failed to create sessions table")?;
        Ok(())
    }

    pub fn upsert(&self, session_id: &str, record_json: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (session_id, record, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(session_id) DO UPDATE SET
                    record = excluded.record,
                    updated_at = datetime('now')",
                params![session_id, record_json],
            )
            .context("Failed to upsert session record")?;
        Ok(())
    }

    pub fn fetch(&self, session_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT record FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query session record")
    }

    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![session_id],
            )
            .context("Failed to delete session record")?;
        Ok(count > 0)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .context("Failed to count session records")
    }
}

/// Async-safe handle implementing [`SessionStore`] over [`SessionDb`].
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<std::sync::Mutex<SessionDb>>,
}

impl SqliteStore {
    pub fn new(db: SessionDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SessionDb::new(path)?))
    }

    /// Run a closure against the database on a blocking thread. All data
    /// passed into `f` must be owned (`'static`).
    async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SessionDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let session_id = record.session_id().to_string();
        let record_json = serde_json::to_string(record)?;
        self.call(move |db| db.upsert(&session_id, &record_json))
            .await
            .map_err(StoreError::Backend)
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord, StoreError> {
        let id = session_id.to_string();
        let row = self
            .call(move |db| db.fetch(&id))
            .await
            .map_err(StoreError::Backend)?;
        match row {
            Some(record_json) => Ok(serde_json::from_str(&record_json)?),
            None => Err(StoreError::NotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let id = session_id.to_string();
        self.call(move |db| db.remove(&id))
            .await
            .map_err(StoreError::Backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Modality};
    use crate::engine::context::{Message, Session, TreatmentContext};
    use tempfile::tempdir;

    fn record(session_id: &str) -> SessionRecord {
        let catalog = Catalog::standard();
        let position = catalog
            .initial_position(Modality::RealityShifting)
            .unwrap();
        let session = Session::new(session_id, "user-1", Modality::RealityShifting, &position);
        let mut context = TreatmentContext::seed(
            session_id,
            "user-1",
            Modality::RealityShifting,
            &position,
            catalog.fingerprint(),
        );
        context.metadata.problem_statement = Some("to run my own workshop".to_string());
        SessionRecord::new(
            session,
            context,
            vec![Message::user("to run my own workshop")],
        )
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = SqliteStore::new(SessionDb::new_in_memory().unwrap());
        let original = record("sess-1");
        store.save(&original).await.unwrap();

        let loaded = store.load("sess-1").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_record() {
        let store = SqliteStore::new(SessionDb::new_in_memory().unwrap());
        let mut rec = record("sess-1");
        store.save(&rec).await.unwrap();

        rec.context.record_response("goal_capture", "to run my own workshop");
        store.save(&rec).await.unwrap();

        let loaded = store.load("sess-1").await.unwrap();
        assert_eq!(loaded.context.user_responses.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = SqliteStore::new(SessionDb::new_in_memory().unwrap());
        let err = store.load("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteStore::new(SessionDb::new_in_memory().unwrap());
        store.save(&record("sess-1")).await.unwrap();
        store.delete("sess-1").await.unwrap();
        assert!(matches!(
            store.load("sess-1").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        store.delete("sess-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_records_survive_reopening_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let original = record("sess-1");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&original).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load("sess-1").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_session_db_counts_rows() {
        let db = SessionDb::new_in_memory().unwrap();
        assert_eq!(db.count().unwrap(), 0);
        db.upsert("a", "{}").unwrap();
        db.upsert("b", "{}").unwrap();
        db.upsert("a", "{\"x\":1}").unwrap();
        assert_eq!(db.count().unwrap(), 2);
        assert!(db.remove("a").unwrap());
        assert!(!db.remove("a").unwrap());
        assert_eq!(db.count().unwrap(), 1);
    }
}
