//! Duplicate-delivery guard.
//!
//! Some delivery paths hand over the same notification twice within a few
//! seconds. A message is a redelivery when its sender equals the previous
//! one and the timestamps are at most the dedup window apart. Bodies are
//! not compared, so two distinct codes from one sender inside the window
//! lose the second one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::pipeline::types::InboundMessage;
use crate::store::traits::{DedupState, DedupStore};

pub struct DedupGuard {
    store: Arc<dyn DedupStore>,
    window: Duration,
    // Serializes load + overwrite across concurrent runs.
    lock: Mutex<()>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn DedupStore>, window: Duration) -> Self {
        Self {
            store,
            window,
            lock: Mutex::new(()),
        }
    }

    /// Whether `message` should go through the rest of the pipeline.
    ///
    /// Always records `message` as the last one seen, duplicate or not.
    pub async fn should_process(&self, message: &InboundMessage) -> bool {
        let _guard = self.lock.lock().await;

        let previous = match self.store.load().await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "Dedup state unreadable, treating message as new");
                None
            }
        };

        let current = DedupState {
            last_sender: message.sender.clone(),
            last_timestamp_ms: message.epoch_ms(),
        };
        if let Err(e) = self.store.save(&current).await {
            warn!(error = %e, "Failed to persist dedup state");
        }

        match previous {
            Some(previous) if is_redelivery(&previous, &current, self.window) => {
                debug!(
                    gap_ms = current.last_timestamp_ms.abs_diff(previous.last_timestamp_ms),
                    "Duplicate delivery"
                );
                false
            }
            _ => true,
        }
    }
}

/// Same sender, timestamps within `window` in either direction.
pub fn is_redelivery(previous: &DedupState, current: &DedupState, window: Duration) -> bool {
    let gap = current
        .last_timestamp_ms
        .abs_diff(previous.last_timestamp_ms);
    previous.last_sender == current.last_sender && u128::from(gap) <= window.as_millis()
}
