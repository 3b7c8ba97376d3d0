//! In-memory stores for tests and embedding without a database.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CollaboratorError;
use crate::store::traits::{DedupState, DedupStore, MessageStore, StoredMessage};

/// Inbox held in a `Vec`, newest first.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    entries: Mutex<Vec<StoredMessage>>,
    denied: AtomicBool,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unread entry as the newest message. Returns its id.
    pub fn push(&self, sender: &str, body: &str, received_at_ms: i64) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = StoredMessage {
            id: id.clone(),
            sender: sender.to_string(),
            body: body.to_string(),
            unread: true,
            received_at_ms,
        };
        self.lock().insert(0, entry);
        id
    }

    /// Simulate a revoked read/write permission.
    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<StoredMessage> {
        self.lock().iter().find(|m| m.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredMessage>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_access(&self) -> Result<(), CollaboratorError> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(CollaboratorError::denied(
                "read_sms",
                "message store permission not granted",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn query_recent(&self, limit: usize) -> Result<Vec<StoredMessage>, CollaboratorError> {
        self.check_access()?;
        Ok(self.lock().iter().take(limit).cloned().collect())
    }

    async fn mark_read(&self, id: &str) -> Result<u64, CollaboratorError> {
        self.check_access()?;
        let mut entries = self.lock();
        match entries.iter_mut().find(|m| m.id == id) {
            Some(entry) => {
                entry.unread = false;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: &str) -> Result<u64, CollaboratorError> {
        self.check_access()?;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|m| m.id != id);
        Ok((before - entries.len()) as u64)
    }
}

/// Dedup record kept only for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    state: Mutex<Option<DedupState>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<DedupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn load(&self) -> Result<Option<DedupState>, CollaboratorError> {
        Ok(self.current())
    }

    async fn save(&self, state: &DedupState) -> Result<(), CollaboratorError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}
