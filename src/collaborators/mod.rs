//! External collaborators the pipeline drives.
//!
//! The pipeline only decides when and in what order these are invoked.
//! Each trait is narrow; failures come back as [`CollaboratorError`] and
//! never escape a dispatch step.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::store::MessageStore;

pub mod autofill;
pub mod clipboard;
pub mod extractor;
pub mod privileged;
pub mod toast;

pub use autofill::{AutoFillRequest, BroadcastAutoFill};
pub use clipboard::SystemClipboard;
pub use extractor::PatternExtractor;
pub use privileged::ShellPrivilegedInput;
pub use toast::ConsoleToast;

/// Decides whether a body carries a verification code and returns it.
pub trait CodeExtractor: Send + Sync {
    fn extract(&self, body: &str) -> Option<String>;
}

/// System clipboard.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write(&self, text: &str) -> Result<(), CollaboratorError>;
    async fn clear(&self) -> Result<(), CollaboratorError>;
}

/// Request channel to the focus-tracking agent.
///
/// At-most-once and unacknowledged: the caller never learns whether the
/// agent received the request.
pub trait AutoFillChannel: Send + Sync {
    fn request_fill(&self, code: &str);
}

/// Operations that need elevated device privilege.
#[async_trait]
pub trait PrivilegedInputSink: Send + Sync {
    /// Type `code` into whatever field has focus.
    async fn type_text(&self, code: &str) -> Result<(), CollaboratorError>;

    /// Start the focus-tracking agent identified by `agent_id`.
    async fn activate_agent(&self, agent_id: &str) -> Result<(), CollaboratorError>;
}

/// Transient user-visible confirmation.
pub trait Notifier: Send + Sync {
    fn announce(&self, text: &str) -> Result<(), CollaboratorError>;
}

/// Everything the pipeline talks to besides settings and the dedup store.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn CodeExtractor>,
    pub clipboard: Arc<dyn ClipboardSink>,
    pub notifier: Arc<dyn Notifier>,
    pub auto_fill: Arc<dyn AutoFillChannel>,
    pub privileged: Arc<dyn PrivilegedInputSink>,
    pub store: Arc<dyn MessageStore>,
}
