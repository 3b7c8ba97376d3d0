//! Store traits: the inbox the matcher searches, and the dedup record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// One inbox entry as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub unread: bool,
    pub received_at_ms: i64,
}

/// Last message seen by the dedup guard. One record per relay instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupState {
    pub last_sender: String,
    pub last_timestamp_ms: i64,
}

/// Platform message store.
///
/// A missing read/write permission is reported as
/// `CollaboratorError::CapabilityDenied`; callers log it and continue.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Newest-first inbox entries, at most `limit`.
    async fn query_recent(&self, limit: usize) -> Result<Vec<StoredMessage>, CollaboratorError>;

    /// Returns rows affected.
    async fn mark_read(&self, id: &str) -> Result<u64, CollaboratorError>;

    /// Returns rows affected.
    async fn delete(&self, id: &str) -> Result<u64, CollaboratorError>;
}

/// Durable single-record storage for [`DedupState`].
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn load(&self) -> Result<Option<DedupState>, CollaboratorError>;

    /// Last write wins.
    async fn save(&self, state: &DedupState) -> Result<(), CollaboratorError>;
}
