//! libSQL backend: durable inbox and dedup record.
//!
//! Supports local file and in-memory databases. The inbox stands in for the
//! platform message store; the binary records each inbound message here
//! before handing it to the pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CollaboratorError, DatabaseError};
use crate::pipeline::types::InboundMessage;
use crate::store::migrations;
use crate::store::traits::{DedupState, DedupStore, MessageStore, StoredMessage};

/// `relay_state` key holding the serialized [`DedupState`].
const DEDUP_STATE_KEY: &str = "dedup_state";

const INBOX_COLUMNS: &str = "id, sender, body, unread, received_at_ms";

/// libSQL-backed store.
///
/// A single connection is reused for all operations;
/// `libsql::Connection` is `Send + Sync`.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> crate::error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// In-memory database (for tests).
    pub async fn new_memory() -> crate::error::Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        let store = Self::from_database(db)?;
        migrations::run_migrations(&store.conn).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Record an inbound message as an unread inbox entry. Returns its id.
    pub async fn insert_message(&self, message: &InboundMessage) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO inbox (id, sender, body, unread, received_at_ms, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)",
                params![
                    id.clone(),
                    message.sender.clone(),
                    message.body.clone(),
                    message.epoch_ms(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;

        debug!(id = %id, "Message inserted into inbox");
        Ok(id)
    }

    /// Record `message` unless the inbox already holds it: same sender and
    /// body, received within `redelivery_window` of it. Returns the new id,
    /// or `None` for a redelivery.
    pub async fn record_inbound(
        &self,
        message: &InboundMessage,
        redelivery_window: Duration,
    ) -> Result<Option<String>, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let window_ms = i64::try_from(redelivery_window.as_millis()).unwrap_or(i64::MAX);
        let inserted = self
            .conn
            .execute(
                "INSERT INTO inbox (id, sender, body, unread, received_at_ms, created_at)
                 SELECT ?1, ?2, ?3, 1, ?4, ?5
                 WHERE NOT EXISTS (
                     SELECT 1 FROM inbox
                     WHERE sender = ?2 AND body = ?3 AND ABS(received_at_ms - ?4) <= ?6
                 )",
                params![
                    id.clone(),
                    message.sender.clone(),
                    message.body.clone(),
                    message.epoch_ms(),
                    Utc::now().to_rfc3339(),
                    window_ms,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_inbound: {e}")))?;

        if inserted == 0 {
            debug!("Redelivered message already in inbox");
            return Ok(None);
        }
        debug!(id = %id, "Message recorded in inbox");
        Ok(Some(id))
    }

    /// Fetch a single inbox entry.
    pub async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {INBOX_COLUMNS} FROM inbox WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_message(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }
}

/// Map a libsql Row to a StoredMessage. Column order matches INBOX_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, libsql::Error> {
    let unread: i64 = row.get(3)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        sender: row.get(1)?,
        body: row.get(2)?,
        unread: unread != 0,
        received_at_ms: row.get(4)?,
    })
}

#[async_trait]
impl MessageStore for LibSqlStore {
    async fn query_recent(&self, limit: usize) -> Result<Vec<StoredMessage>, CollaboratorError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {INBOX_COLUMNS} FROM inbox ORDER BY received_at_ms DESC, rowid DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("query_recent: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Skipping inbox row: {e}"),
            }
        }
        Ok(messages)
    }

    async fn mark_read(&self, id: &str) -> Result<u64, CollaboratorError> {
        let rows = self
            .conn
            .execute("UPDATE inbox SET unread = 0 WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_read: {e}")))?;
        Ok(rows)
    }

    async fn delete(&self, id: &str) -> Result<u64, CollaboratorError> {
        let rows = self
            .conn
            .execute("DELETE FROM inbox WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete: {e}")))?;
        Ok(rows)
    }
}

#[async_trait]
impl DedupStore for LibSqlStore {
    async fn load(&self) -> Result<Option<DedupState>, CollaboratorError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM relay_state WHERE key = ?1",
                params![DEDUP_STATE_KEY],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load dedup state: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                let state = serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load dedup state: {e}")).into()),
        }
    }

    async fn save(&self, state: &DedupState) -> Result<(), CollaboratorError> {
        let value =
            serde_json::to_string(state).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO relay_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![DEDUP_STATE_KEY, value, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save dedup state: {e}")))?;
        Ok(())
    }
}
