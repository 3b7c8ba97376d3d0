//! Auto-fill requests fanned out to in-process focus agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::collaborators::AutoFillChannel;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// One request for the focus agent to type `code` into the focused field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFillRequest {
    pub code: String,
    pub requested_at: DateTime<Utc>,
}

/// Broadcast-backed auto-fill channel.
///
/// Sending with no subscribers drops the request, matching the
/// at-most-once contract.
pub struct BroadcastAutoFill {
    tx: broadcast::Sender<AutoFillRequest>,
}

impl BroadcastAutoFill {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a focus agent.
    pub fn subscribe(&self) -> broadcast::Receiver<AutoFillRequest> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastAutoFill {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoFillChannel for BroadcastAutoFill {
    fn request_fill(&self, code: &str) {
        let request = AutoFillRequest {
            code: code.to_string(),
            requested_at: Utc::now(),
        };
        let receivers = self.tx.send(request).unwrap_or(0);
        debug!(receivers, "Auto-fill request broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_request() {
        let channel = BroadcastAutoFill::new();
        let mut rx = channel.subscribe();
        channel.request_fill("483920");
        let req = rx.recv().await.unwrap();
        assert_eq!(req.code, "483920");
    }

    #[test]
    fn no_subscribers_is_silent() {
        let channel = BroadcastAutoFill::new();
        channel.request_fill("483920");
    }
}
