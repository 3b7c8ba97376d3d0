//! Trigger intake.
//!
//! Each trigger line is parsed, recorded in the inbox once per distinct
//! message, and queued for the pipeline. A redelivery (same sender and
//! body within the redelivery window) is still queued so the dedup guard
//! sees it, but it never becomes a second inbox row.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::types::InboundMessage;
use crate::pipeline::worker::PipelineQueue;
use crate::store::LibSqlStore;

pub struct Intake {
    store: Arc<LibSqlStore>,
    queue: PipelineQueue,
    redelivery_window: Duration,
    // Last message seen, recorded or not. Covers rows already deleted.
    last_seen: Mutex<Option<InboundMessage>>,
}

impl Intake {
    pub fn new(store: Arc<LibSqlStore>, queue: PipelineQueue, redelivery_window: Duration) -> Self {
        Self {
            store,
            queue,
            redelivery_window,
            last_seen: Mutex::new(None),
        }
    }

    /// Handle one trigger line. Blank and malformed lines are skipped.
    ///
    /// Returns whether a message was queued. Fails only when the pipeline
    /// queue is closed.
    pub async fn accept_line(&self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(false);
        }

        match InboundMessage::from_json_line(line) {
            Ok(message) => {
                self.accept(message).await?;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed trigger line");
                Ok(false)
            }
        }
    }

    pub async fn accept(&self, message: InboundMessage) -> Result<()> {
        if self.is_redelivery(&message).await {
            debug!("Redelivery not recorded in inbox");
        } else {
            if let Err(e) = self
                .store
                .record_inbound(&message, self.redelivery_window)
                .await
            {
                warn!(error = %e, "Failed to record message in inbox");
            }
        }

        self.queue.enqueue(message).await?;
        Ok(())
    }

    async fn is_redelivery(&self, message: &InboundMessage) -> bool {
        let mut last = self.last_seen.lock().await;
        let repeat = last.as_ref().is_some_and(|prev| {
            prev.sender == message.sender
                && prev.body == message.body
                && u128::from(prev.epoch_ms().abs_diff(message.epoch_ms()))
                    <= self.redelivery_window.as_millis()
        });
        *last = Some(message.clone());
        repeat
    }
}
