//! Shared types for the message pipeline.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::mode::Strategy;
use crate::store::traits::StoredMessage;

// ── Inbound message ─────────────────────────────────────────────────

/// A text message as delivered by the platform trigger.
///
/// Immutable once built. One pipeline run consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Originating address (short code, phone number).
    pub sender: String,
    /// Full message body.
    pub body: String,
    /// Delivery time, serialized as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            timestamp,
        }
    }

    /// Build from the trigger's epoch-millisecond timestamp.
    pub fn from_epoch_ms(sender: impl Into<String>, body: impl Into<String>, epoch_ms: i64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(sender, body, timestamp)
    }

    pub fn epoch_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Parse one trigger line: `{"sender": .., "body": .., "timestamp": <epoch-ms>}`.
    ///
    /// A missing timestamp means "now".
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Payload {
            sender: String,
            #[serde(default)]
            body: String,
            #[serde(default)]
            timestamp: Option<i64>,
        }

        let payload: Payload = serde_json::from_str(line)?;
        Ok(match payload.timestamp {
            Some(ms) => Self::from_epoch_ms(payload.sender, payload.body, ms),
            None => Self::new(payload.sender, payload.body, Utc::now()),
        })
    }
}

// ── Extracted code ──────────────────────────────────────────────────

/// A verification code pulled out of a message body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractedCode(String);

impl ExtractedCode {
    /// Wrap an extractor result verbatim. An empty value means "no code".
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() { None } else { Some(Self(value)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExtractedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Message matching ────────────────────────────────────────────────

/// Identifies the stored copy of a processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriteria {
    pub sender: String,
    /// The processed body, used verbatim as a prefix.
    pub body_prefix: String,
}

impl MatchCriteria {
    pub fn for_message(message: &InboundMessage) -> Self {
        Self {
            sender: message.sender.clone(),
            body_prefix: message.body.clone(),
        }
    }

    pub fn matches(&self, entry: &StoredMessage) -> bool {
        entry.sender == self.sender && entry.unread && entry.body.starts_with(&self.body_prefix)
    }
}

/// Housekeeping applied to the stored copy of a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    MarkAsRead,
    Delete,
}

impl StoreOp {
    /// Delete wins over mark-as-read; `None` when neither is enabled.
    pub fn from_flags(delete_on_success: bool, mark_as_read: bool) -> Option<Self> {
        if delete_on_success {
            Some(Self::Delete)
        } else if mark_as_read {
            Some(Self::MarkAsRead)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MarkAsRead => "mark_as_read",
            Self::Delete => "delete",
        }
    }
}

// ── Run outcome ─────────────────────────────────────────────────────

/// How a single pipeline run ended. Used for logs and tests only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Same sender redelivered within the dedup window.
    Duplicate,
    /// Global switch off.
    Disabled,
    EmptyBody,
    /// The extractor found nothing.
    NoCode,
    /// Side effects were handed to the dispatcher.
    Dispatched {
        code: ExtractedCode,
        strategy: Strategy,
    },
}

impl RunOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Disabled => "disabled",
            Self::EmptyBody => "empty_body",
            Self::NoCode => "no_code",
            Self::Dispatched { .. } => "dispatched",
        }
    }
}
