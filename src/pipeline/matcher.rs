//! Locates the stored copy of a processed message and applies housekeeping.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MATCH_SEARCH_LIMIT;
use crate::error::CollaboratorError;
use crate::pipeline::types::{MatchCriteria, StoreOp};
use crate::store::traits::{MessageStore, StoredMessage};

/// Result of [`MessageMatcher::operate_on_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No unread entry in the search window matched.
    NotFound,
    /// The operation ran against entry `id`.
    Applied { id: String, rows: u64 },
    /// The matching entry vanished before the operation ran.
    NoRowsAffected { id: String },
    /// The store refused or failed.
    Failed(CollaboratorError),
}

#[derive(Clone)]
pub struct MessageMatcher {
    store: Arc<dyn MessageStore>,
    search_limit: usize,
}

impl MessageMatcher {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            search_limit: MATCH_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// First entry, newest to oldest within the search window, that matches.
    pub async fn find_match(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Option<StoredMessage>, CollaboratorError> {
        let recent = self.store.query_recent(self.search_limit).await?;
        Ok(recent
            .into_iter()
            .take(self.search_limit)
            .find(|entry| criteria.matches(entry)))
    }

    /// Apply `op` to the first match. Only one entry is ever touched and
    /// failures are logged, not returned.
    pub async fn operate_on_match(&self, criteria: &MatchCriteria, op: StoreOp) -> MatchOutcome {
        let entry = match self.find_match(criteria).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(op = op.label(), "No stored message matched");
                return MatchOutcome::NotFound;
            }
            Err(e) => {
                warn!(op = op.label(), error = %e, "Message store query failed");
                return MatchOutcome::Failed(e);
            }
        };

        let result = match op {
            StoreOp::MarkAsRead => self.store.mark_read(&entry.id).await,
            StoreOp::Delete => self.store.delete(&entry.id).await,
        };

        match result {
            Ok(0) => {
                debug!(op = op.label(), id = %entry.id, "Matched message no longer present");
                MatchOutcome::NoRowsAffected { id: entry.id }
            }
            Ok(rows) => {
                info!(op = op.label(), id = %entry.id, rows, "Stored message updated");
                MatchOutcome::Applied { id: entry.id, rows }
            }
            Err(e) => {
                warn!(op = op.label(), id = %entry.id, error = %e, "Message store update failed");
                MatchOutcome::Failed(e)
            }
        }
    }
}
